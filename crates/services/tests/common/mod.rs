#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Offset, Utc};
use lesson_core::model::{Course, CourseId, Lesson, LessonId, ProgressRecord, ProgressUpdate, UserId};
use services::{CourseCompleted, CourseCompletionListener, PlayState, PlaybackProbe, TrackerConfig};
use storage::repository::{
    EnrollmentRepository, InMemoryRepository, ProgressRepository, Storage, StorageError,
};
use tokio::time::Instant;

pub const USER: UserId = UserId::new(1);
pub const COURSE: CourseId = CourseId::new(10);
pub const NEXT_COURSE: CourseId = CourseId::new(11);

pub fn lesson_id(position: u32) -> LessonId {
    LessonId::new(100 + u64::from(position))
}

/// Three lessons at positions 0, 1, 2, followed by `NEXT_COURSE`.
pub fn course() -> Arc<Course> {
    let lessons = (0..3)
        .map(|position| {
            Lesson::new(
                lesson_id(position),
                COURSE,
                position,
                5,
                format!("Lesson {}", position + 1),
                format!("video-{position}"),
            )
            .unwrap()
        })
        .collect();
    Arc::new(
        Course::new(COURSE, "Intro to ownership", lessons)
            .unwrap()
            .with_next_course(NEXT_COURSE),
    )
}

/// UTC day boundaries, a long flush period, and the default resume tail.
pub fn config() -> TrackerConfig {
    TrackerConfig::default()
        .with_utc_offset(Utc.fix())
        .with_flush_interval(Duration::from_secs(60))
}

/// A player whose playhead follows the (possibly paused) tokio clock.
pub struct FakePlayer {
    state: Mutex<PlayerState>,
}

struct PlayerState {
    ready: bool,
    play_state: PlayState,
    duration: f64,
    anchor_position: f64,
    anchor_at: Instant,
    seeks: Vec<f64>,
}

impl PlayerState {
    fn position(&self) -> f64 {
        let pos = if self.play_state == PlayState::Playing {
            self.anchor_position + self.anchor_at.elapsed().as_secs_f64()
        } else {
            self.anchor_position
        };
        pos.min(self.duration)
    }

    fn reanchor(&mut self) {
        self.anchor_position = self.position();
        self.anchor_at = Instant::now();
    }
}

impl FakePlayer {
    pub fn new(duration: f64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PlayerState {
                ready: false,
                play_state: PlayState::Paused,
                duration,
                anchor_position: 0.0,
                anchor_at: Instant::now(),
                seeks: Vec::new(),
            }),
        })
    }

    /// Ready and playing from zero.
    pub fn playing(duration: f64) -> Arc<Self> {
        let player = Self::new(duration);
        player.set_ready(true);
        player.set_state(PlayState::Playing);
        player
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    pub fn set_state(&self, play_state: PlayState) {
        let mut s = self.state.lock().unwrap();
        s.reanchor();
        s.play_state = play_state;
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().unwrap().seeks.clone()
    }
}

impl PlaybackProbe for FakePlayer {
    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    fn current_position(&self) -> Option<f64> {
        let s = self.state.lock().unwrap();
        s.ready.then(|| s.position())
    }

    fn duration(&self) -> Option<f64> {
        let s = self.state.lock().unwrap();
        s.ready.then_some(s.duration)
    }

    fn play_state(&self) -> PlayState {
        self.state.lock().unwrap().play_state
    }

    fn seek(&self, seconds: f64) {
        let mut s = self.state.lock().unwrap();
        s.anchor_position = seconds;
        s.anchor_at = Instant::now();
        s.seeks.push(seconds);
    }
}

/// In-memory progress store that can refuse or delay writes and counts them.
#[derive(Clone, Default)]
pub struct FlakyProgress {
    pub inner: InMemoryRepository,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    write_delay_ms: Arc<AtomicU64>,
    writes: Arc<AtomicUsize>,
}

impl FlakyProgress {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every upsert sleeps this long before touching the store.
    pub fn slow_writes(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap();
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn storage(&self) -> Storage {
        let progress: Arc<dyn ProgressRepository> = Arc::new(self.clone());
        let enrollments: Arc<dyn EnrollmentRepository> = Arc::new(self.inner.clone());
        Storage {
            progress,
            enrollments,
        }
    }

    pub async fn stored(&self, lesson: LessonId) -> Option<ProgressRecord> {
        self.inner.get_progress(USER, lesson).await.unwrap()
    }
}

#[async_trait]
impl ProgressRepository for FlakyProgress {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("read refused".into()));
        }
        self.inner.get_progress(user, lesson).await
    }

    async fn upsert_progress(
        &self,
        user: UserId,
        lesson: LessonId,
        update: &ProgressUpdate,
    ) -> Result<ProgressRecord, StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("write refused".into()));
        }
        self.inner.upsert_progress(user, lesson, update).await
    }

    async fn list_progress(
        &self,
        user: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.inner.list_progress(user, lessons).await
    }
}

#[derive(Default)]
pub struct CompletionRecorder {
    events: Mutex<Vec<CourseCompleted>>,
}

impl CompletionRecorder {
    pub fn events(&self) -> Vec<CourseCompleted> {
        self.events.lock().unwrap().clone()
    }
}

impl CourseCompletionListener for CompletionRecorder {
    fn course_completed(&self, event: &CourseCompleted) {
        self.events.lock().unwrap().push(event.clone());
    }
}
