mod enrollment;
mod ids;
mod lesson;
mod progress;

pub use ids::{CourseId, LessonId, ParseIdError, UserId};

pub use enrollment::Enrollment;
pub use lesson::{Course, CourseError, Lesson, LessonError};
pub use progress::{ProgressError, ProgressRecord, ProgressUpdate, percent_of};
