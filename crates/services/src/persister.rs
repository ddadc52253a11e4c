use std::sync::Arc;

use lesson_core::Clock;
use lesson_core::model::{LessonId, ProgressRecord, ProgressUpdate, UserId, percent_of};
use storage::repository::{ProgressRepository, StorageError};
use tracing::{debug, info, warn};

/// Inputs of one flush, read from the session at flush time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushSnapshot {
    pub accumulated: u64,
    /// `None` when the player cannot currently report a position.
    pub position: Option<f64>,
    pub duration: Option<f64>,
}

/// Result of a flush attempt.
#[derive(Debug)]
pub enum FlushOutcome {
    /// Nothing watched since the last successful flush.
    NothingNew,
    /// The player could not report a position.
    PlayerNotReady,
    Persisted(ProgressRecord),
    /// The write failed; the watermark is unchanged so the next flush retries.
    Failed(StorageError),
}

impl FlushOutcome {
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        matches!(self, FlushOutcome::Persisted(_))
    }
}

/// Writes accumulated watch time to the store behind a high-water mark.
pub struct ProgressPersister {
    user: UserId,
    lesson: LessonId,
    clock: Clock,
    store: Arc<dyn ProgressRepository>,
    last_flushed: u64,
}

impl ProgressPersister {
    /// `watermark` is the watched-seconds value already stored.
    #[must_use]
    pub fn new(
        user: UserId,
        lesson: LessonId,
        clock: Clock,
        store: Arc<dyn ProgressRepository>,
        watermark: u64,
    ) -> Self {
        Self {
            user,
            lesson,
            clock,
            store,
            last_flushed: watermark,
        }
    }

    /// Decides whether a flush is due and builds the write for it.
    ///
    /// Returns the skip outcome when nothing new was watched or the player
    /// cannot report a position. The watermark only moves on `commit`.
    pub fn prepare(&self, snapshot: FlushSnapshot) -> Result<PendingFlush, FlushOutcome> {
        if snapshot.accumulated <= self.last_flushed {
            return Err(FlushOutcome::NothingNew);
        }
        let Some(position) = snapshot.position else {
            debug!(lesson = %self.lesson, "player not ready, skipping flush");
            return Err(FlushOutcome::PlayerNotReady);
        };

        let duration = snapshot.duration.unwrap_or(0.0);
        let percent = percent_of(position, duration);
        let clamped = if duration > 0.0 { position.min(duration) } else { position };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let position_secs = clamped.max(0.0).round() as u64;

        Ok(PendingFlush {
            user: self.user,
            lesson: self.lesson,
            store: Arc::clone(&self.store),
            update: ProgressUpdate::watch(
                snapshot.accumulated,
                position_secs,
                percent,
                self.clock.now(),
            ),
            accumulated: snapshot.accumulated,
        })
    }

    /// Moves the watermark after a successful write. Never moves it back.
    pub fn commit(&mut self, watched: u64) {
        self.last_flushed = self.last_flushed.max(watched);
    }

    /// Prepares, writes and commits in one step.
    pub async fn flush(&mut self, snapshot: FlushSnapshot) -> FlushOutcome {
        let pending = match self.prepare(snapshot) {
            Ok(pending) => pending,
            Err(skipped) => return skipped,
        };
        let outcome = pending.write().await;
        if outcome.is_persisted() {
            self.commit(pending.accumulated());
        }
        outcome
    }

    /// Watched seconds covered by the last successful flush.
    #[must_use]
    pub fn last_flushed(&self) -> u64 {
        self.last_flushed
    }
}

/// A prepared upsert that can be awaited without borrowing the persister.
pub struct PendingFlush {
    user: UserId,
    lesson: LessonId,
    store: Arc<dyn ProgressRepository>,
    update: ProgressUpdate,
    accumulated: u64,
}

impl PendingFlush {
    /// Watched seconds this write carries.
    #[must_use]
    pub fn accumulated(&self) -> u64 {
        self.accumulated
    }

    pub async fn write(&self) -> FlushOutcome {
        match self.store.upsert_progress(self.user, self.lesson, &self.update).await {
            Ok(record) => {
                info!(
                    user = %self.user,
                    lesson = %self.lesson,
                    watched = self.accumulated,
                    position = ?self.update.last_position_seconds(),
                    percent = ?self.update.progress_percent(),
                    "progress flushed"
                );
                FlushOutcome::Persisted(record)
            }
            Err(err) => {
                warn!(
                    user = %self.user,
                    lesson = %self.lesson,
                    watched = self.accumulated,
                    error = %err,
                    "progress flush failed, will retry"
                );
                FlushOutcome::Failed(err)
            }
        }
    }
}
