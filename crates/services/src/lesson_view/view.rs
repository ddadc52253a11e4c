use std::sync::Arc;
use std::time::Duration;

use lesson_core::model::LessonId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::{LessonSession, SessionSnapshot};
use crate::error::ProgressionError;
use crate::persister::FlushOutcome;
use crate::progression::{CompletionOutcome, CourseProgressionController};
use crate::watch_time::{SAMPLE_INTERVAL, TickOutcome};

/// A spawned loop with its own cancellation token.
///
/// Dropping the handle cancels the loop without waiting for it.
struct PeriodicTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    fn spawn<F, Fut>(name: &'static str, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(cancel.clone()));
        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancels the loop and waits for it to exit.
    async fn stop(mut self) {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if let Err(err) = handle.await {
            warn!(task = self.name, error = %err, "periodic task failed to join");
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// State shared between a view and its two loops.
///
/// `flush_lane` serializes flushes so writes reach the store in snapshot
/// order. The session lock is never held across a store call.
struct Shared {
    session: Mutex<LessonSession>,
    flush_lane: Mutex<()>,
}

impl Shared {
    async fn flush(&self) -> FlushOutcome {
        let _lane = self.flush_lane.lock().await;
        let prepared = self.session.lock().await.prepare_flush();
        let pending = match prepared {
            Ok(pending) => pending,
            Err(skipped) => return skipped,
        };
        let outcome = pending.write().await;
        self.session.lock().await.commit_flush(&pending, &outcome);
        outcome
    }
}

/// A mounted lesson: the shared session plus its sampler and flush timer.
pub struct LessonView {
    lesson: LessonId,
    shared: Arc<Shared>,
    sampler: Option<PeriodicTask>,
    flusher: Option<PeriodicTask>,
}

impl LessonView {
    /// Starts the 1 Hz sampler and the periodic flush timer.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn mount(session: LessonSession, flush_interval: Duration) -> Self {
        let lesson = session.lesson();
        let shared = Arc::new(Shared {
            session: Mutex::new(session),
            flush_lane: Mutex::new(()),
        });

        let sampler = PeriodicTask::spawn("sampler", {
            let shared = Arc::clone(&shared);
            move |cancel| run_sampler(shared, cancel)
        });
        let flusher = PeriodicTask::spawn("flusher", {
            let shared = Arc::clone(&shared);
            move |cancel| run_flusher(shared, flush_interval, cancel)
        });

        info!(lesson = %lesson, "lesson mounted");
        Self {
            lesson,
            shared,
            sampler: Some(sampler),
            flusher: Some(flusher),
        }
    }

    #[must_use]
    pub fn lesson(&self) -> LessonId {
        self.lesson
    }

    /// Tears the view down: sampler, flush timer, final flush, probe release.
    ///
    /// The final flush outcome is returned for inspection only; failures are
    /// already logged.
    pub async fn unmount(mut self) -> FlushOutcome {
        if let Some(sampler) = self.sampler.take() {
            sampler.stop().await;
        }
        if let Some(flusher) = self.flusher.take() {
            flusher.stop().await;
        }

        let outcome = self.shared.flush().await;
        self.shared.session.lock().await.release_probe();
        info!(lesson = %self.lesson, "lesson unmounted");
        outcome
    }

    pub async fn notify_player_ready(&self) -> Option<f64> {
        self.shared.session.lock().await.on_player_ready()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.shared.session.lock().await.snapshot()
    }

    /// Flushes pending watch time, then completes the lesson.
    ///
    /// Lock order is progression, then flush lane, then session. The
    /// session lock is only taken around the flush snapshot and commit, so
    /// sampling continues during the writes.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Storage` if the forced flush or any
    /// completion write fails.
    pub async fn complete_lesson(
        &self,
        progression: &Mutex<CourseProgressionController>,
    ) -> Result<CompletionOutcome, ProgressionError> {
        let mut progression = progression.lock().await;

        if !progression.is_completed(self.lesson) {
            if let FlushOutcome::Failed(err) = self.shared.flush().await {
                return Err(err.into());
            }
        }
        progression.complete_lesson(self.lesson).await
    }
}

async fn run_sampler(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + SAMPLE_INTERVAL, SAMPLE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let (outcome, lesson) = {
                    let mut session = shared.session.lock().await;
                    (session.tick(Instant::now()), session.lesson())
                };
                if outcome == TickOutcome::Ended {
                    shared.flush().await;
                    debug!(lesson = %lesson, "playback ended, sampler stopped");
                    break;
                }
            }
        }
    }
}

async fn run_flusher(shared: Arc<Shared>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                shared.flush().await;
            }
        }
    }
}
