//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::{CourseId, LessonId};
use storage::repository::StorageError;

/// Errors emitted by lesson and course completion.
///
/// All variants are recoverable: the caller may retry the same action.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("lesson {lesson} is not part of course {course}")]
    UnknownLesson { lesson: LessonId, course: CourseId },
    #[error("no lesson is mounted")]
    NoActiveLesson,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while loading the process-wide player API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error("player api failed to load: {0}")]
    Load(String),
}

/// Errors emitted by `CourseTracker` setup and mounting.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("lesson {lesson} is not part of course {course}")]
    UnknownLesson { lesson: LessonId, course: CourseId },
    #[error(transparent)]
    Storage(#[from] StorageError),
}
