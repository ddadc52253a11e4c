use std::time::Duration;

use lesson_core::model::ProgressRecord;
use tracing::{debug, info};

use crate::playback::PlaybackProbe;

/// Seeks a freshly loaded player to the stored position, at most once.
#[derive(Debug, Clone)]
pub struct ResumeController {
    target: u64,
    tail: Duration,
    settled: bool,
    has_resumed: bool,
}

impl ResumeController {
    /// Resume target comes from the record loaded at mount, if any.
    #[must_use]
    pub fn new(record: Option<&ProgressRecord>, tail: Duration) -> Self {
        Self {
            target: record.map_or(0, ProgressRecord::last_position_seconds),
            tail,
            settled: false,
            has_resumed: false,
        }
    }

    /// Handles a ready signal from the player.
    ///
    /// Seeks only when the stored position is past zero and before the last
    /// `tail` seconds of the video, so a finished lesson reloads from the
    /// start instead of its closing seconds. Returns the seek target when one
    /// was issued. The decision is made once, against the first known
    /// duration; later calls are no-ops.
    pub fn on_ready(&mut self, probe: &dyn PlaybackProbe) -> Option<f64> {
        if self.settled || !probe.is_ready() {
            return None;
        }
        if self.target == 0 {
            self.settled = true;
            return None;
        }
        let duration = probe.duration()?;
        self.settled = true;

        #[allow(clippy::cast_precision_loss)]
        let target = self.target as f64;
        if target >= duration - self.tail.as_secs_f64() {
            debug!(position = target, duration, "stored position is inside the tail, not resuming");
            return None;
        }

        probe.seek(target);
        self.has_resumed = true;
        info!(position = target, "resumed playback");
        Some(target)
    }

    /// Whether the resume decision has been made, seek or not.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Whether a seek was actually issued.
    #[must_use]
    pub fn has_resumed(&self) -> bool {
        self.has_resumed
    }

    #[must_use]
    pub fn target(&self) -> u64 {
        self.target
    }
}
