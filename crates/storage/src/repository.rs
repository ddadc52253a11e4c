use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{
    CourseId, Enrollment, LessonId, ProgressRecord, ProgressUpdate, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Per-user-per-lesson watch progress.
///
/// Upserts are keyed by `(user, lesson)` and merged with
/// [`ProgressRecord::apply`] semantics, so callers only ever send the fields
/// they own and never read-modify-write a full record.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the record for a user and lesson, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Insert or merge `update` into the record for a user and lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn upsert_progress(
        &self,
        user: UserId,
        lesson: LessonId,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, StorageError>;

    /// Fetch existing records for the given lessons. Missing ones are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_progress(
        &self,
        user: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<ProgressRecord>, StorageError>;
}

/// Course-level standing of a learner.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Fetch an enrollment, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_enrollment(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// Mark a course completed. Keeps the first completion time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn complete_enrollment(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError>;

    /// Unlock a course for the learner, creating the enrollment if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn unlock_enrollment(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Enrollment, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    progress: Arc<Mutex<HashMap<(UserId, LessonId), ProgressRecord>>>,
    enrollments: Arc<Mutex<HashMap<(UserId, CourseId), Enrollment>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record as-is, bypassing the merge rules.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_raw(&self, record: ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert((record.user_id(), record.lesson_id()), record);
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user, lesson)).cloned())
    }

    async fn upsert_progress(
        &self,
        user: UserId,
        lesson: LessonId,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let record = guard
            .entry((user, lesson))
            .and_modify(|r| r.apply(update))
            .or_insert_with(|| ProgressRecord::inserted(user, lesson, update));
        Ok(record.clone())
    }

    async fn list_progress(
        &self,
        user: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(lessons
            .iter()
            .filter_map(|lesson| guard.get(&(user, *lesson)).cloned())
            .collect())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn get_enrollment(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = self
            .enrollments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user, course)).cloned())
    }

    async fn complete_enrollment(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        let mut guard = self
            .enrollments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let enrollment = guard
            .entry((user, course))
            .or_insert_with(|| Enrollment::new(user, course));
        enrollment.complete(at);
        Ok(enrollment.clone())
    }

    async fn unlock_enrollment(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Enrollment, StorageError> {
        let mut guard = self
            .enrollments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let enrollment = guard
            .entry((user, course))
            .or_insert_with(|| Enrollment::new(user, course));
        enrollment.unlocked = true;
        Ok(enrollment.clone())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let enrollments: Arc<dyn EnrollmentRepository> = Arc::new(repo);
        Self {
            progress,
            enrollments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::time::fixed_now;

    #[tokio::test]
    async fn upsert_creates_then_merges_single_record() {
        let repo = InMemoryRepository::new();
        let (user, lesson) = (UserId::new(1), LessonId::new(7));

        let first = repo
            .upsert_progress(user, lesson, &ProgressUpdate::watch(10, 10, 3, fixed_now()))
            .await
            .unwrap();
        assert_eq!(first.watched_seconds(), 10);

        let merged = repo
            .upsert_progress(user, lesson, &ProgressUpdate::completion(fixed_now()))
            .await
            .unwrap();
        assert!(merged.completed());
        assert_eq!(merged.watched_seconds(), 10);

        let listed = repo
            .list_progress(user, &[lesson, LessonId::new(8)])
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn enrollment_completion_and_unlock_are_idempotent() {
        let repo = InMemoryRepository::new();
        let (user, course) = (UserId::new(1), CourseId::new(3));

        assert!(repo.get_enrollment(user, course).await.unwrap().is_none());

        repo.complete_enrollment(user, course, fixed_now()).await.unwrap();
        let again = repo
            .complete_enrollment(user, course, fixed_now() + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(again.completed_at, Some(fixed_now()));

        let unlocked = repo.unlock_enrollment(user, CourseId::new(4)).await.unwrap();
        assert!(unlocked.unlocked);
        assert!(!unlocked.is_completed());
    }
}
