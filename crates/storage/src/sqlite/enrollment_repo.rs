use chrono::{DateTime, Utc};
use lesson_core::model::{CourseId, Enrollment, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_enrollment_row};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn get_enrollment(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, course_id, unlocked, completed_at
                FROM enrollments
                WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("course_id", course.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn complete_enrollment(
        &self,
        user: UserId,
        course: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        let row = sqlx::query(
            r"
                INSERT INTO enrollments (user_id, course_id, unlocked, completed_at)
                VALUES (?1, ?2, 0, ?3)
                ON CONFLICT(user_id, course_id) DO UPDATE SET
                    completed_at = COALESCE(enrollments.completed_at, excluded.completed_at)
                RETURNING user_id, course_id, unlocked, completed_at
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("course_id", course.value())?)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        map_enrollment_row(&row)
    }

    async fn unlock_enrollment(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Enrollment, StorageError> {
        let row = sqlx::query(
            r"
                INSERT INTO enrollments (user_id, course_id, unlocked, completed_at)
                VALUES (?1, ?2, 1, NULL)
                ON CONFLICT(user_id, course_id) DO UPDATE SET unlocked = 1
                RETURNING user_id, course_id, unlocked, completed_at
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("course_id", course.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        map_enrollment_row(&row)
    }
}
