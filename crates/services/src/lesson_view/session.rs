use std::sync::Arc;

use lesson_core::model::LessonId;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::persister::{FlushOutcome, FlushSnapshot, PendingFlush, ProgressPersister};
use crate::playback::{PlaybackProbe, PlaybackSample};
use crate::resume::ResumeController;
use crate::watch_time::{TickOutcome, WatchTimeAccumulator};

/// Observable state of a mounted lesson.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub lesson: LessonId,
    pub accumulated: u64,
    pub last_flushed: u64,
    pub position: Option<f64>,
    pub percent: u8,
    pub resumed: bool,
    pub ended: bool,
}

/// Everything one lesson view owns: the probe binding and the three
/// per-lesson components.
pub struct LessonSession {
    lesson: LessonId,
    probe: Option<Arc<dyn PlaybackProbe>>,
    accumulator: WatchTimeAccumulator,
    resume: ResumeController,
    persister: ProgressPersister,
    ended: bool,
}

impl LessonSession {
    #[must_use]
    pub fn new(
        lesson: LessonId,
        probe: Arc<dyn PlaybackProbe>,
        accumulator: WatchTimeAccumulator,
        resume: ResumeController,
        persister: ProgressPersister,
    ) -> Self {
        Self {
            lesson,
            probe: Some(probe),
            accumulator,
            resume,
            persister,
            ended: false,
        }
    }

    /// One sampler tick. A pending resume is attempted first so the sample
    /// sees the restored playhead.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Some(probe) = self.probe.as_deref() else {
            return TickOutcome::NotReady;
        };
        self.resume.on_ready(probe);

        let outcome = self.accumulator.tick(probe, now);
        debug!(
            lesson = %self.lesson,
            ?outcome,
            watched = self.accumulator.accumulated(),
            "sample"
        );
        if outcome == TickOutcome::Ended {
            self.ended = true;
        }
        outcome
    }

    /// Player reported ready; returns the resume seek target if one was issued.
    pub fn on_player_ready(&mut self) -> Option<f64> {
        let probe = self.probe.as_deref()?;
        self.resume.on_ready(probe)
    }

    /// Builds the next write from the live playhead, not the last sampled
    /// one. The returned write runs without the session borrowed.
    pub fn prepare_flush(&self) -> Result<PendingFlush, FlushOutcome> {
        let sample = self.probe.as_deref().and_then(PlaybackSample::read);
        self.persister.prepare(FlushSnapshot {
            accumulated: self.accumulator.accumulated(),
            position: sample.map(|s| s.position),
            duration: sample.and_then(|s| s.duration),
        })
    }

    pub fn commit_flush(&mut self, pending: &PendingFlush, outcome: &FlushOutcome) {
        if outcome.is_persisted() {
            self.persister.commit(pending.accumulated());
        }
    }

    /// Prepares, writes and commits while holding `&mut self`.
    pub async fn flush(&mut self) -> FlushOutcome {
        let pending = match self.prepare_flush() {
            Ok(pending) => pending,
            Err(skipped) => return skipped,
        };
        let outcome = pending.write().await;
        self.commit_flush(&pending, &outcome);
        outcome
    }

    /// Drops the probe binding. Later ticks and flushes see no player.
    pub fn release_probe(&mut self) {
        if self.probe.take().is_some() {
            debug!(lesson = %self.lesson, "probe released");
        }
    }

    #[must_use]
    pub fn lesson(&self) -> LessonId {
        self.lesson
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            lesson: self.lesson,
            accumulated: self.accumulator.accumulated(),
            last_flushed: self.persister.last_flushed(),
            position: self.accumulator.position(),
            percent: self.accumulator.percent(),
            resumed: self.resume.has_resumed(),
            ended: self.ended,
        }
    }
}
