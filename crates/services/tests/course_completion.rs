mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use common::{
    COURSE, CompletionRecorder, FakePlayer, FlakyProgress, NEXT_COURSE, USER, config, course,
    lesson_id,
};
use lesson_core::Clock;
use lesson_core::model::ProgressUpdate;
use lesson_core::time::{fixed_clock, fixed_now};
use lesson_core::unlock::UnlockStatus;
use services::{CompletionOutcome, CourseTracker, ProgressionError};
use storage::repository::{EnrollmentRepository, ProgressRepository};

async fn tracker_at(store: &FlakyProgress, clock: Clock) -> CourseTracker {
    CourseTracker::open(USER, course(), &store.storage(), clock, config())
        .await
        .unwrap()
}

async fn complete_before(store: &FlakyProgress, position: u32, days_ago: i64) {
    let at = fixed_now() - ChronoDuration::days(days_ago);
    store
        .inner
        .upsert_progress(USER, lesson_id(position), &ProgressUpdate::completion(at))
        .await
        .unwrap();
}

#[tokio::test]
async fn completing_today_daily_locks_the_next_lesson() {
    let store = FlakyProgress::default();
    let tracker = tracker_at(&store, fixed_clock()).await;
    assert_eq!(
        tracker.statuses().await,
        vec![UnlockStatus::Available, UnlockStatus::Locked, UnlockStatus::Locked]
    );

    tracker
        .on_lesson_mount(lesson_id(0), FakePlayer::new(300.0))
        .await
        .unwrap();
    let outcome = tracker.complete_lesson().await.unwrap();
    assert_eq!(outcome, CompletionOutcome::LessonCompleted);

    assert_eq!(tracker.unlock_status(1).await, UnlockStatus::DailyLocked);
    assert_eq!(tracker.unlock_status(2).await, UnlockStatus::Locked);
    assert_eq!(tracker.unlock_status(3).await, UnlockStatus::Locked);
    tracker.on_lesson_unmount().await;

    let tomorrow = tracker_at(&store, Clock::fixed(fixed_now() + ChronoDuration::days(1))).await;
    assert_eq!(
        tomorrow.statuses().await,
        vec![UnlockStatus::Available, UnlockStatus::Available, UnlockStatus::Locked]
    );
    assert_eq!(tomorrow.course_progress().await.completed, 1);
}

#[tokio::test]
async fn legacy_completion_without_timestamp_fails_open() {
    let store = FlakyProgress::default();
    let legacy = lesson_core::model::ProgressRecord::from_persisted(
        USER,
        lesson_id(0),
        300,
        300,
        true,
        None,
        100,
        fixed_now(),
    )
    .unwrap();
    store.inner.insert_raw(legacy).unwrap();

    let tracker = tracker_at(&store, fixed_clock()).await;
    assert_eq!(tracker.unlock_status(1).await, UnlockStatus::Available);
}

#[tokio::test]
async fn repeated_completion_is_a_no_op() {
    let store = FlakyProgress::default();
    let tracker = tracker_at(&store, fixed_clock()).await;
    tracker
        .on_lesson_mount(lesson_id(0), FakePlayer::new(300.0))
        .await
        .unwrap();

    tracker.complete_lesson().await.unwrap();
    let writes = store.writes();

    let again = tracker.complete_lesson().await.unwrap();
    assert_eq!(again, CompletionOutcome::AlreadyCompleted);
    assert_eq!(store.writes(), writes);

    tracker.on_lesson_unmount().await;
}

#[tokio::test(start_paused = true)]
async fn failed_completion_write_is_reported_and_retryable() {
    let store = FlakyProgress::default();
    let tracker = tracker_at(&store, fixed_clock()).await;
    tracker
        .on_lesson_mount(lesson_id(0), FakePlayer::playing(300.0))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    store.fail_writes(true);
    let err = tracker.complete_lesson().await.unwrap_err();
    assert!(matches!(err, ProgressionError::Storage(_)));
    assert_eq!(tracker.unlock_status(1).await, UnlockStatus::Locked);
    assert!(store.stored(lesson_id(0)).await.is_none());

    store.fail_writes(false);
    let outcome = tracker.complete_lesson().await.unwrap();
    assert_eq!(outcome, CompletionOutcome::LessonCompleted);

    let stored = store.stored(lesson_id(0)).await.unwrap();
    assert!(stored.completed());
    assert_eq!(stored.completed_at(), Some(fixed_now()));
    assert_eq!(stored.watched_seconds(), 3);
    assert_eq!(stored.progress_percent(), 100);
    assert_eq!(tracker.unlock_status(1).await, UnlockStatus::DailyLocked);

    tracker.on_lesson_unmount().await;
}

#[tokio::test]
async fn concurrent_final_completion_announces_course_once() {
    let store = FlakyProgress::default();
    complete_before(&store, 0, 3).await;
    complete_before(&store, 1, 2).await;

    let recorder = Arc::new(CompletionRecorder::default());
    let tracker = tracker_at(&store, fixed_clock())
        .await
        .with_listener(recorder.clone());
    assert_eq!(tracker.unlock_status(2).await, UnlockStatus::Available);

    tracker
        .on_lesson_mount(lesson_id(2), FakePlayer::new(300.0))
        .await
        .unwrap();
    let (a, b) = tokio::join!(tracker.complete_lesson(), tracker.complete_lesson());
    let outcomes = [a.unwrap(), b.unwrap()];

    let finished = outcomes
        .iter()
        .filter(|o| matches!(o, CompletionOutcome::CourseCompleted(_)))
        .count();
    assert_eq!(finished, 1);
    assert!(outcomes.contains(&CompletionOutcome::AlreadyCompleted));

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].course, COURSE);
    assert_eq!(events[0].unlocked_next, Some(NEXT_COURSE));
    assert!(tracker.is_course_completed().await);

    let enrollment = store
        .inner
        .get_enrollment(USER, COURSE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.completed_at, Some(fixed_now()));
    let next = store
        .inner
        .get_enrollment(USER, NEXT_COURSE)
        .await
        .unwrap()
        .unwrap();
    assert!(next.unlocked);
    assert_eq!(tracker.course_progress().await.percent, 100);

    tracker.on_lesson_unmount().await;
}

#[tokio::test]
async fn completing_without_a_mounted_lesson_fails() {
    let store = FlakyProgress::default();
    let tracker = tracker_at(&store, fixed_clock()).await;

    let err = tracker.complete_lesson().await.unwrap_err();
    assert!(matches!(err, ProgressionError::NoActiveLesson));
    assert_eq!(store.writes(), 0);
}
