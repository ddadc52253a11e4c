use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use lesson_core::model::Course;
use services::{PlayState, PlaybackProbe, PlayerFactory};
use tokio::time::Instant;

/// Headless stand-in for the embedded video player.
///
/// Starts playing as soon as it is bound and advances in real time.
#[derive(Debug)]
pub struct SimulatedPlayer {
    duration: f64,
    inner: Mutex<Playhead>,
}

#[derive(Debug)]
struct Playhead {
    anchor: f64,
    since: Instant,
    state: PlayState,
}

impl SimulatedPlayer {
    fn new(duration: f64) -> Self {
        Self {
            duration,
            inner: Mutex::new(Playhead {
                anchor: 0.0,
                since: Instant::now(),
                state: PlayState::Playing,
            }),
        }
    }

    fn playhead(&self) -> std::sync::MutexGuard<'_, Playhead> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn position_of(&self, head: &Playhead) -> f64 {
        let pos = match head.state {
            PlayState::Playing => head.anchor + head.since.elapsed().as_secs_f64(),
            PlayState::Paused | PlayState::Buffering | PlayState::Ended => head.anchor,
        };
        pos.min(self.duration)
    }
}

impl PlaybackProbe for SimulatedPlayer {
    fn is_ready(&self) -> bool {
        true
    }

    fn current_position(&self) -> Option<f64> {
        let head = self.playhead();
        Some(self.position_of(&head))
    }

    fn duration(&self) -> Option<f64> {
        Some(self.duration)
    }

    fn play_state(&self) -> PlayState {
        let head = self.playhead();
        if self.position_of(&head) >= self.duration {
            PlayState::Ended
        } else {
            head.state
        }
    }

    fn seek(&self, seconds: f64) {
        let mut head = self.playhead();
        head.anchor = seconds.clamp(0.0, self.duration);
        head.since = Instant::now();
    }
}

/// Binds simulated players using each lesson's advertised length.
pub struct SimulatedPlayers {
    durations: HashMap<String, f64>,
}

impl SimulatedPlayers {
    pub fn for_course(course: &Course) -> Self {
        let durations = course
            .lessons()
            .iter()
            .map(|l| (l.video_ref().to_owned(), f64::from(l.duration_minutes()) * 60.0))
            .collect();
        Self { durations }
    }
}

impl PlayerFactory for SimulatedPlayers {
    fn bind(&self, video_ref: &str) -> Arc<dyn PlaybackProbe> {
        let duration = self.durations.get(video_ref).copied().unwrap_or(600.0);
        Arc::new(SimulatedPlayer::new(duration))
    }
}
