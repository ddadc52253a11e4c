use lesson_core::model::{LessonId, ProgressRecord, ProgressUpdate, UserId};

use super::SqliteRepository;
use super::mapping::{id_i64, map_progress_row};
use crate::repository::{ProgressRepository, StorageError};

fn opt_i64(field: &'static str, v: Option<u64>) -> Result<Option<i64>, StorageError> {
    v.map(|v| id_i64(field, v)).transpose()
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    user_id, lesson_id, watched_seconds, last_position_seconds,
                    progress_percent, completed, completed_at, last_watched_at
                FROM lesson_progress
                WHERE user_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("lesson_id", lesson.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(
        &self,
        user: UserId,
        lesson: LessonId,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, StorageError> {
        // Same merge as `ProgressRecord::apply`: watched takes the max,
        // completion is sticky and pins percent at 100.
        let row = sqlx::query(
            r"
                INSERT INTO lesson_progress (
                    user_id, lesson_id, watched_seconds, last_position_seconds,
                    progress_percent, completed, completed_at, last_watched_at
                )
                VALUES (?1, ?2, COALESCE(?3, 0), COALESCE(?4, 0), COALESCE(?5, 0), ?6, ?7, ?8)
                ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                    watched_seconds = MAX(
                        lesson_progress.watched_seconds,
                        COALESCE(?3, lesson_progress.watched_seconds)
                    ),
                    last_position_seconds = COALESCE(?4, lesson_progress.last_position_seconds),
                    progress_percent = CASE
                        WHEN lesson_progress.completed = 1 OR excluded.completed = 1 THEN 100
                        ELSE COALESCE(?5, lesson_progress.progress_percent)
                    END,
                    completed = MAX(lesson_progress.completed, excluded.completed),
                    completed_at = COALESCE(lesson_progress.completed_at, excluded.completed_at),
                    last_watched_at = excluded.last_watched_at
                RETURNING
                    user_id, lesson_id, watched_seconds, last_position_seconds,
                    progress_percent, completed, completed_at, last_watched_at
            ",
        )
        .bind(id_i64("user_id", user.value())?)
        .bind(id_i64("lesson_id", lesson.value())?)
        .bind(opt_i64("watched_seconds", update.watched_seconds())?)
        .bind(opt_i64("last_position_seconds", update.last_position_seconds())?)
        .bind(update.progress_percent().map(i64::from))
        .bind(update.marks_completed())
        .bind(update.completed_at())
        .bind(update.last_watched_at())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        map_progress_row(&row)
    }

    async fn list_progress(
        &self,
        user: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        if lessons.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            r"
                SELECT
                    user_id, lesson_id, watched_seconds, last_position_seconds,
                    progress_percent, completed, completed_at, last_watched_at
                FROM lesson_progress
                WHERE user_id = ?1 AND lesson_id IN (
            ",
        );
        for i in 0..lessons.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push(')');

        let mut query = sqlx::query(&sql).bind(id_i64("user_id", user.value())?);
        for lesson in lessons {
            query = query.bind(id_i64("lesson_id", lesson.value())?);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_progress_row).collect()
    }
}
