use lesson_core::model::{CourseId, Enrollment, LessonId, ProgressRecord, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn percent_from_i64(v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid progress_percent: {v}")))
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let user_id = UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?);
    let lesson_id = LessonId::new(i64_to_u64("lesson_id", row.try_get("lesson_id").map_err(ser)?)?);
    let watched = i64_to_u64("watched_seconds", row.try_get("watched_seconds").map_err(ser)?)?;
    let position = i64_to_u64(
        "last_position_seconds",
        row.try_get("last_position_seconds").map_err(ser)?,
    )?;
    let percent = percent_from_i64(row.try_get("progress_percent").map_err(ser)?)?;
    let completed: bool = row.try_get("completed").map_err(ser)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;
    let last_watched_at = row.try_get("last_watched_at").map_err(ser)?;

    ProgressRecord::from_persisted(
        user_id,
        lesson_id,
        watched,
        position,
        completed,
        completed_at,
        percent,
        last_watched_at,
    )
    .map_err(ser)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    Ok(Enrollment {
        user_id: UserId::new(i64_to_u64("user_id", row.try_get("user_id").map_err(ser)?)?),
        course_id: CourseId::new(i64_to_u64("course_id", row.try_get("course_id").map_err(ser)?)?),
        unlocked: row.try_get("unlocked").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}
