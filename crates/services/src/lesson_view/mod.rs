//! Per-lesson tracking: owned session state driven by two cancellable timers.

mod session;
mod view;

pub use session::{LessonSession, SessionSnapshot};
pub use view::LessonView;
