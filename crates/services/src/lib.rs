#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod lesson_view;
pub mod persister;
pub mod playback;
pub mod progression;
pub mod resume;
pub mod tracker;
pub mod watch_time;

#[cfg(test)]
mod test_player;

pub use lesson_core::Clock;

pub use config::TrackerConfig;
pub use error::{BootstrapError, ProgressionError, TrackerError};
pub use lesson_view::SessionSnapshot;
pub use persister::FlushOutcome;
pub use playback::{PlayState, PlaybackProbe, PlayerBootstrap, PlayerFactory};
pub use progression::{
    CompletionOutcome, CourseCompleted, CourseCompletionListener, CourseProgress,
    CourseProgressionController,
};
pub use tracker::CourseTracker;
pub use watch_time::TickOutcome;
