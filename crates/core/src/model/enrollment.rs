use chrono::{DateTime, Utc};

use crate::model::ids::{CourseId, UserId};

/// A learner's standing in a course.
///
/// `unlocked` is set when a prerequisite course is finished; `completed_at`
/// is present iff the course itself has been finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub unlocked: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId) -> Self {
        Self {
            user_id,
            course_id,
            unlocked: false,
            completed_at: None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Marks the enrollment completed, keeping the first completion time.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        if self.completed_at.is_none() {
            self.completed_at = Some(at);
        }
    }
}
