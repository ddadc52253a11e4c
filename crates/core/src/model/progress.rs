use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{LessonId, UserId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress percent must be in 0..=100, got {0}")]
    InvalidPercent(u8),
}

/// Percent of `position` over `duration`, rounded and capped at 100.
///
/// Unknown, zero or non-finite durations report 0.
#[must_use]
pub fn percent_of(position: f64, duration: f64) -> u8 {
    if !duration.is_finite() || duration <= 0.0 || !position.is_finite() || position <= 0.0 {
        return 0;
    }
    let pct = (position / duration * 100.0).round().min(100.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        pct as u8
    }
}

//
// ─── PROGRESS UPDATE ──────────────────────────────────────────────────────────
//

/// Partial-field upsert payload for a progress record.
///
/// Only two shapes exist: a watch update written by flushes and a completion
/// update. Both backends merge it the same way, see [`ProgressRecord::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    watched_seconds: Option<u64>,
    last_position_seconds: Option<u64>,
    progress_percent: Option<u8>,
    completed_at: Option<DateTime<Utc>>,
    last_watched_at: DateTime<Utc>,
}

impl ProgressUpdate {
    /// Watch-time flush: watched seconds, playhead and derived percent.
    #[must_use]
    pub fn watch(watched_seconds: u64, position_seconds: u64, percent: u8, at: DateTime<Utc>) -> Self {
        Self {
            watched_seconds: Some(watched_seconds),
            last_position_seconds: Some(position_seconds),
            progress_percent: Some(percent.min(100)),
            completed_at: None,
            last_watched_at: at,
        }
    }

    /// Marks the lesson completed at `at` with 100 percent progress.
    #[must_use]
    pub fn completion(at: DateTime<Utc>) -> Self {
        Self {
            watched_seconds: None,
            last_position_seconds: None,
            progress_percent: Some(100),
            completed_at: Some(at),
            last_watched_at: at,
        }
    }

    #[must_use]
    pub fn watched_seconds(&self) -> Option<u64> {
        self.watched_seconds
    }

    #[must_use]
    pub fn last_position_seconds(&self) -> Option<u64> {
        self.last_position_seconds
    }

    #[must_use]
    pub fn progress_percent(&self) -> Option<u8> {
        self.progress_percent
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn marks_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn last_watched_at(&self) -> DateTime<Utc> {
        self.last_watched_at
    }
}

//
// ─── PROGRESS RECORD ──────────────────────────────────────────────────────────
//

/// Persisted per-user-per-lesson watch state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    user_id: UserId,
    lesson_id: LessonId,
    watched_seconds: u64,
    last_position_seconds: u64,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    progress_percent: u8,
    last_watched_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Builds the record an insert of `update` produces.
    #[must_use]
    pub fn inserted(user_id: UserId, lesson_id: LessonId, update: &ProgressUpdate) -> Self {
        Self {
            user_id,
            lesson_id,
            watched_seconds: update.watched_seconds.unwrap_or(0),
            last_position_seconds: update.last_position_seconds.unwrap_or(0),
            completed: update.marks_completed(),
            completed_at: update.completed_at,
            progress_percent: update.progress_percent.unwrap_or(0),
            last_watched_at: update.last_watched_at,
        }
    }

    /// Rehydrates a record read from a store.
    ///
    /// `completed` without `completed_at` is accepted: older rows carry it and
    /// the unlock policy handles it explicitly.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidPercent` if `progress_percent` exceeds 100.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        user_id: UserId,
        lesson_id: LessonId,
        watched_seconds: u64,
        last_position_seconds: u64,
        completed: bool,
        completed_at: Option<DateTime<Utc>>,
        progress_percent: u8,
        last_watched_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if progress_percent > 100 {
            return Err(ProgressError::InvalidPercent(progress_percent));
        }
        Ok(Self {
            user_id,
            lesson_id,
            watched_seconds,
            last_position_seconds,
            completed,
            completed_at,
            progress_percent,
            last_watched_at,
        })
    }

    /// Merges an update into an existing record.
    ///
    /// Watched seconds take the maximum and completion is sticky, so a stale
    /// write never regresses either. Position is last-writer-wins.
    pub fn apply(&mut self, update: &ProgressUpdate) {
        if let Some(watched) = update.watched_seconds {
            self.watched_seconds = self.watched_seconds.max(watched);
        }
        if let Some(position) = update.last_position_seconds {
            self.last_position_seconds = position;
        }
        if update.marks_completed() {
            self.completed = true;
            if self.completed_at.is_none() {
                self.completed_at = update.completed_at;
            }
        }
        if self.completed {
            self.progress_percent = 100;
        } else if let Some(pct) = update.progress_percent {
            self.progress_percent = pct;
        }
        self.last_watched_at = update.last_watched_at;
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn watched_seconds(&self) -> u64 {
        self.watched_seconds
    }

    #[must_use]
    pub fn last_position_seconds(&self) -> u64 {
        self.last_position_seconds
    }

    #[must_use]
    pub fn completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    #[must_use]
    pub fn last_watched_at(&self) -> DateTime<Utc> {
        self.last_watched_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
