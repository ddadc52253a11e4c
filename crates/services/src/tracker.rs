//! Host-facing surface: one tracker per learner and course.
//!
//! The host calls [`CourseTracker::on_lesson_mount`] when a lesson page
//! appears and [`CourseTracker::on_lesson_unmount`] when it goes away. At most
//! one lesson is mounted at a time.

use std::sync::Arc;

use lesson_core::Clock;
use lesson_core::model::{Course, LessonId, ProgressRecord, UserId};
use lesson_core::unlock::UnlockStatus;
use storage::repository::{ProgressRepository, Storage};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::TrackerConfig;
use crate::error::{ProgressionError, TrackerError};
use crate::lesson_view::{LessonSession, LessonView, SessionSnapshot};
use crate::persister::{FlushOutcome, ProgressPersister};
use crate::playback::PlaybackProbe;
use crate::progression::{
    CompletionOutcome, CourseCompletionListener, CourseProgress, CourseProgressionController,
};
use crate::resume::ResumeController;
use crate::watch_time::WatchTimeAccumulator;

pub struct CourseTracker {
    user: UserId,
    course: Arc<Course>,
    clock: Clock,
    config: TrackerConfig,
    progress: Arc<dyn ProgressRepository>,
    progression: Mutex<CourseProgressionController>,
    active: Mutex<Option<LessonView>>,
}

impl CourseTracker {
    /// Loads course progression for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Storage` if stored progress cannot be read.
    pub async fn open(
        user: UserId,
        course: Arc<Course>,
        storage: &Storage,
        clock: Clock,
        config: TrackerConfig,
    ) -> Result<Self, TrackerError> {
        let progression = CourseProgressionController::load(
            user,
            Arc::clone(&course),
            clock,
            config.unlock_policy(),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.enrollments),
        )
        .await?;

        Ok(Self {
            user,
            course,
            clock,
            config,
            progress: Arc::clone(&storage.progress),
            progression: Mutex::new(progression),
            active: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn CourseCompletionListener>) -> Self {
        self.progression.get_mut().set_listener(listener);
        self
    }

    /// Starts tracking `lesson` against `probe`, replacing any mounted lesson.
    ///
    /// A failure to read stored progress is logged and tracking starts fresh;
    /// the store's merge rule keeps later writes from regressing it.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::UnknownLesson` if the lesson is not in the course.
    pub async fn on_lesson_mount(
        &self,
        lesson: LessonId,
        probe: Arc<dyn PlaybackProbe>,
    ) -> Result<(), TrackerError> {
        if self.course.lesson(lesson).is_none() {
            return Err(TrackerError::UnknownLesson {
                lesson,
                course: self.course.id(),
            });
        }

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.unmount().await;
        }

        let record = match self.progress.get_progress(self.user, lesson).await {
            Ok(record) => record,
            Err(err) => {
                warn!(
                    user = %self.user,
                    lesson = %lesson,
                    error = %err,
                    "could not load stored progress, starting fresh"
                );
                None
            }
        };
        let seed = record.as_ref().map_or(0, ProgressRecord::watched_seconds);

        let mut session = LessonSession::new(
            lesson,
            probe,
            WatchTimeAccumulator::new(seed, Instant::now()),
            ResumeController::new(record.as_ref(), self.config.resume_tail()),
            ProgressPersister::new(
                self.user,
                lesson,
                self.clock,
                Arc::clone(&self.progress),
                seed,
            ),
        );
        session.on_player_ready();

        info!(user = %self.user, lesson = %lesson, watched = seed, "tracking lesson");
        *active = Some(LessonView::mount(session, self.config.flush_interval()));
        Ok(())
    }

    /// Tears down the mounted lesson, if any, returning its final flush.
    pub async fn on_lesson_unmount(&self) -> Option<FlushOutcome> {
        let view = self.active.lock().await.take()?;
        Some(view.unmount().await)
    }

    /// Completes the mounted lesson.
    ///
    /// Concurrent calls run one after another, so course completion is
    /// announced once.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::NoActiveLesson` if nothing is mounted and
    /// `ProgressionError::Storage` if a write fails; the call can be retried.
    pub async fn complete_lesson(&self) -> Result<CompletionOutcome, ProgressionError> {
        let active = self.active.lock().await;
        let Some(view) = active.as_ref() else {
            return Err(ProgressionError::NoActiveLesson);
        };
        view.complete_lesson(&self.progression).await
    }

    /// Forwards a player-ready signal to the mounted lesson.
    pub async fn notify_player_ready(&self) -> Option<f64> {
        let active = self.active.lock().await;
        active.as_ref()?.notify_player_ready().await
    }

    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let active = self.active.lock().await;
        Some(active.as_ref()?.snapshot().await)
    }

    pub async fn unlock_status(&self, index: usize) -> UnlockStatus {
        self.progression.lock().await.unlock_status(index)
    }

    pub async fn statuses(&self) -> Vec<UnlockStatus> {
        self.progression.lock().await.statuses()
    }

    pub async fn course_progress(&self) -> CourseProgress {
        self.progression.lock().await.course_progress()
    }

    pub async fn is_course_completed(&self) -> bool {
        self.progression.lock().await.is_course_completed()
    }

    pub async fn active_lesson(&self) -> Option<LessonId> {
        self.active.lock().await.as_ref().map(LessonView::lesson)
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
