use std::sync::Arc;

use chrono::{DateTime, Utc};
use lesson_core::Clock;
use lesson_core::model::{Course, CourseId, LessonId, ProgressUpdate, UserId};
use lesson_core::unlock::{CompletionLedger, LessonUnlockPolicy, UnlockStatus};
use serde::Serialize;
use storage::repository::{EnrollmentRepository, ProgressRepository, StorageError};
use tracing::{debug, info};

use crate::error::ProgressionError;

/// Downstream hook fired once when a learner finishes a course.
pub trait CourseCompletionListener: Send + Sync {
    fn course_completed(&self, event: &CourseCompleted);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseCompleted {
    pub user: UserId,
    pub course: CourseId,
    pub completed_at: DateTime<Utc>,
    /// Course whose enrollment was unlocked as a result, if any.
    pub unlocked_next: Option<CourseId>,
}

/// What a `complete_lesson` call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Nothing to do; the lesson was already completed.
    AlreadyCompleted,
    LessonCompleted,
    /// The lesson was the last one and the course is now completed.
    CourseCompleted(CourseCompleted),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CourseProgress {
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
}

/// Per-course completion state for one learner.
///
/// Holds the completed-lesson ledger in memory and advances it only after the
/// store accepted the write, so a failed completion can simply be retried.
pub struct CourseProgressionController {
    user: UserId,
    course: Arc<Course>,
    clock: Clock,
    policy: LessonUnlockPolicy,
    progress: Arc<dyn ProgressRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    ledger: CompletionLedger<LessonId>,
    course_completed: bool,
    listener: Option<Arc<dyn CourseCompletionListener>>,
}

impl CourseProgressionController {
    /// Loads completion state for every lesson of `course`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if progress or the enrollment cannot be read.
    pub async fn load(
        user: UserId,
        course: Arc<Course>,
        clock: Clock,
        policy: LessonUnlockPolicy,
        progress: Arc<dyn ProgressRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Result<Self, StorageError> {
        let records = progress.list_progress(user, &course.lesson_ids()).await?;
        let ledger = CompletionLedger::from_records(&records);
        let course_completed = enrollments
            .get_enrollment(user, course.id())
            .await?
            .is_some_and(|e| e.is_completed());

        debug!(
            user = %user,
            course = %course.id(),
            completed = ledger.completed_count(),
            course_completed,
            "course progression loaded"
        );

        Ok(Self {
            user,
            course,
            clock,
            policy,
            progress,
            enrollments,
            ledger,
            course_completed,
            listener: None,
        })
    }

    pub fn set_listener(&mut self, listener: Arc<dyn CourseCompletionListener>) {
        self.listener = Some(listener);
    }

    /// Marks `lesson` completed, finishing the course after its last lesson.
    ///
    /// Already completed lessons are a no-op, except that a last lesson whose
    /// course completion failed earlier retries it.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::UnknownLesson` for a lesson outside the
    /// course and `ProgressionError::Storage` if a write fails. The in-memory
    /// state is not advanced past the failed write.
    pub async fn complete_lesson(
        &mut self,
        lesson: LessonId,
    ) -> Result<CompletionOutcome, ProgressionError> {
        if self.course.lesson(lesson).is_none() {
            return Err(ProgressionError::UnknownLesson {
                lesson,
                course: self.course.id(),
            });
        }

        if self.ledger.is_completed(lesson) {
            if self.course.is_last(lesson) && !self.course_completed {
                let at = self.ledger.completed_at(lesson).unwrap_or_else(|| self.clock.now());
                return self.complete_course(at).await;
            }
            debug!(user = %self.user, lesson = %lesson, "lesson already completed");
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        let now = self.clock.now();
        let record = self
            .progress
            .upsert_progress(self.user, lesson, &ProgressUpdate::completion(now))
            .await?;
        let completed_at = record.completed_at().unwrap_or(now);
        self.ledger.record(lesson, Some(completed_at));
        info!(user = %self.user, lesson = %lesson, "lesson completed");

        if self.course.is_last(lesson) {
            return self.complete_course(completed_at).await;
        }
        Ok(CompletionOutcome::LessonCompleted)
    }

    async fn complete_course(
        &mut self,
        at: DateTime<Utc>,
    ) -> Result<CompletionOutcome, ProgressionError> {
        let course = self.course.id();
        let enrollment = self
            .enrollments
            .complete_enrollment(self.user, course, at)
            .await?;

        let unlocked_next = match self.course.next_course() {
            Some(next) => {
                self.enrollments.unlock_enrollment(self.user, next).await?;
                Some(next)
            }
            None => None,
        };

        self.course_completed = true;
        let event = CourseCompleted {
            user: self.user,
            course,
            completed_at: enrollment.completed_at.unwrap_or(at),
            unlocked_next,
        };
        info!(
            user = %self.user,
            course = %course,
            next = ?unlocked_next,
            "course completed"
        );
        if let Some(listener) = &self.listener {
            listener.course_completed(&event);
        }
        Ok(CompletionOutcome::CourseCompleted(event))
    }

    /// Access state of the lesson at `index`, as of now.
    #[must_use]
    pub fn unlock_status(&self, index: usize) -> UnlockStatus {
        self.unlock_status_at(index, self.clock.now())
    }

    #[must_use]
    pub fn unlock_status_at(&self, index: usize, now: DateTime<Utc>) -> UnlockStatus {
        self.policy.status(self.course.lessons(), &self.ledger, index, now)
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<UnlockStatus> {
        self.policy
            .statuses(self.course.lessons(), &self.ledger, self.clock.now())
    }

    #[must_use]
    pub fn course_progress(&self) -> CourseProgress {
        let total = self.course.lessons().len();
        let completed = self
            .course
            .lessons()
            .iter()
            .filter(|l| self.ledger.is_completed(l.id()))
            .count();
        let percent = if total == 0 {
            0
        } else {
            u8::try_from((completed * 100 + total / 2) / total).unwrap_or(100)
        };
        CourseProgress {
            completed,
            total,
            percent,
        }
    }

    #[must_use]
    pub fn is_completed(&self, lesson: LessonId) -> bool {
        self.ledger.is_completed(lesson)
    }

    #[must_use]
    pub fn is_course_completed(&self) -> bool {
        self.course_completed
    }

    #[must_use]
    pub fn course(&self) -> &Arc<Course> {
        &self.course
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }
}
