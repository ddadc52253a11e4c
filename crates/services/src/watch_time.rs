use std::time::Duration;

use lesson_core::model::percent_of;
use tokio::time::Instant;

use crate::playback::{PlayState, PlaybackProbe, PlaybackSample};

/// Sampling cadence. Each accepted tick is worth one watched second.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest gap between samples that still counts.
pub const MIN_TICK: Duration = Duration::from_millis(900);

/// Longest gap between samples that still counts; longer gaps are stalls or
/// throttled timers.
pub const MAX_TICK: Duration = Duration::from_millis(1500);

/// What a single sampler tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Playing with a regular gap; one second was added.
    Counted,
    /// Paused, buffering, or an irregular gap.
    Rejected,
    /// The probe could not report a position.
    NotReady,
    /// The player reached the end; sampling should stop.
    Ended,
}

/// Turns probe samples into a monotonic count of seconds actually watched.
#[derive(Debug, Clone)]
pub struct WatchTimeAccumulator {
    accumulated: u64,
    last_sample_at: Instant,
    position: Option<f64>,
    duration: Option<f64>,
    percent: u8,
}

impl WatchTimeAccumulator {
    /// Starts counting from `seed` seconds (the stored value) at `started_at`.
    #[must_use]
    pub fn new(seed: u64, started_at: Instant) -> Self {
        Self {
            accumulated: seed,
            last_sample_at: started_at,
            position: None,
            duration: None,
            percent: 0,
        }
    }

    /// Samples the probe once.
    ///
    /// The sample timestamp always moves to `now`. Position and percent are
    /// refreshed whenever the probe is ready; only the counter is gated.
    pub fn tick(&mut self, probe: &dyn PlaybackProbe, now: Instant) -> TickOutcome {
        let gap = now.saturating_duration_since(self.last_sample_at);
        self.last_sample_at = now;

        let Some(sample) = PlaybackSample::read(probe) else {
            return TickOutcome::NotReady;
        };
        self.position = Some(sample.position);
        self.duration = sample.duration;
        self.percent = percent_of(sample.position, sample.duration.unwrap_or(0.0));

        match sample.state {
            PlayState::Ended => TickOutcome::Ended,
            PlayState::Playing if (MIN_TICK..=MAX_TICK).contains(&gap) => {
                self.accumulated += 1;
                TickOutcome::Counted
            }
            PlayState::Playing | PlayState::Paused | PlayState::Buffering => TickOutcome::Rejected,
        }
    }

    #[must_use]
    pub fn accumulated(&self) -> u64 {
        self.accumulated
    }

    /// Last observed playhead.
    #[must_use]
    pub fn position(&self) -> Option<f64> {
        self.position
    }

    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Last observed position as a percent of duration.
    #[must_use]
    pub fn percent(&self) -> u8 {
        self.percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_player::ScriptedPlayer;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn counts_only_regular_playing_ticks() {
        let start = Instant::now();
        let player = ScriptedPlayer::ready(300.0);
        player.set_state(PlayState::Playing);
        let mut acc = WatchTimeAccumulator::new(0, start);

        assert_eq!(acc.tick(&player, start + secs(1.0)), TickOutcome::Counted);
        assert_eq!(acc.tick(&player, start + secs(2.0)), TickOutcome::Counted);
        // Throttled timer: 3 s gap is not counted.
        assert_eq!(acc.tick(&player, start + secs(5.0)), TickOutcome::Rejected);
        // Double fire: 0.1 s gap is not counted.
        assert_eq!(acc.tick(&player, start + secs(5.1)), TickOutcome::Rejected);
        assert_eq!(acc.tick(&player, start + secs(6.1)), TickOutcome::Counted);

        assert_eq!(acc.accumulated(), 3);
    }

    #[test]
    fn accepts_window_edges() {
        let start = Instant::now();
        let player = ScriptedPlayer::ready(300.0);
        player.set_state(PlayState::Playing);
        let mut acc = WatchTimeAccumulator::new(0, start);

        assert_eq!(acc.tick(&player, start + MIN_TICK), TickOutcome::Counted);
        assert_eq!(acc.tick(&player, start + MIN_TICK + MAX_TICK), TickOutcome::Counted);
        assert_eq!(
            acc.tick(&player, start + MIN_TICK + MAX_TICK + MAX_TICK + secs(0.01)),
            TickOutcome::Rejected
        );
    }

    #[test]
    fn non_playing_ticks_leave_counter_but_update_position() {
        let start = Instant::now();
        let player = ScriptedPlayer::ready(200.0);
        let mut acc = WatchTimeAccumulator::new(10, start);

        for (i, state) in [PlayState::Paused, PlayState::Buffering].into_iter().enumerate() {
            player.set_state(state);
            player.advance(50.0);
            let now = start + secs(1.0 + i as f64);
            assert_eq!(acc.tick(&player, now), TickOutcome::Rejected);
            assert_eq!(acc.accumulated(), 10);
        }

        assert_eq!(acc.position(), Some(100.0));
        assert_eq!(acc.percent(), 50);
    }

    #[test]
    fn not_ready_probe_only_moves_timestamp() {
        let start = Instant::now();
        let player = ScriptedPlayer::new(300.0);
        player.set_state(PlayState::Playing);
        let mut acc = WatchTimeAccumulator::new(0, start);

        assert_eq!(acc.tick(&player, start + secs(5.0)), TickOutcome::NotReady);
        assert_eq!(acc.position(), None);

        // The gap is measured from the not-ready tick, so this one counts.
        player.set_ready(true);
        assert_eq!(acc.tick(&player, start + secs(6.0)), TickOutcome::Counted);
        assert_eq!(acc.accumulated(), 1);
    }

    #[test]
    fn ended_is_reported_without_counting() {
        let start = Instant::now();
        let player = ScriptedPlayer::ready(60.0);
        player.advance(60.0);
        player.set_state(PlayState::Ended);
        let mut acc = WatchTimeAccumulator::new(59, start);

        assert_eq!(acc.tick(&player, start + secs(1.0)), TickOutcome::Ended);
        assert_eq!(acc.accumulated(), 59);
        assert_eq!(acc.percent(), 100);
    }

    #[test]
    fn counter_never_decreases_over_mixed_ticks() {
        let start = Instant::now();
        let player = ScriptedPlayer::ready(500.0);
        let mut acc = WatchTimeAccumulator::new(0, start);
        let states = [PlayState::Playing, PlayState::Paused, PlayState::Buffering];
        let gaps = [1.0, 0.3, 2.7, 1.2, 0.95, 4.0, 1.0];

        let mut now = start;
        let mut previous = acc.accumulated();
        for i in 0..50 {
            player.set_state(states[i % states.len()]);
            if i % 7 == 3 {
                player.set_ready(false);
            } else {
                player.set_ready(true);
            }
            now += secs(gaps[i % gaps.len()]);
            acc.tick(&player, now);
            assert!(acc.accumulated() >= previous);
            previous = acc.accumulated();
        }
    }
}
