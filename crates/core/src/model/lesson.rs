use thiserror::Error;

use crate::model::ids::{CourseId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("course must contain at least one lesson")]
    NoLessons,

    #[error("lesson {lesson} belongs to course {found}, expected {expected}")]
    ForeignLesson {
        lesson: LessonId,
        expected: CourseId,
        found: CourseId,
    },

    #[error("lesson {lesson} has position {found}, expected {expected}")]
    PositionGap {
        lesson: LessonId,
        expected: u32,
        found: u32,
    },

    #[error("lesson {0} appears more than once")]
    DuplicateLesson(LessonId),
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// An ordered unit of course content bound to one playable video.
///
/// Lessons are immutable for the lifetime of a lesson view. Title,
/// description and video reference are opaque to the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    position: u32,
    duration_minutes: u32,
    title: String,
    description: Option<String>,
    video_ref: String,
}

impl Lesson {
    /// Creates a new lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` if the title is blank.
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        position: u32,
        duration_minutes: u32,
        title: impl Into<String>,
        video_ref: impl Into<String>,
    ) -> Result<Self, LessonError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }

        Ok(Self {
            id,
            course_id,
            position,
            duration_minutes,
            title,
            description: None,
            video_ref: video_ref.into(),
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    /// 0-based ordinal inside the course.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Nominal duration as authored; the player's reported duration wins at runtime.
    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn video_ref(&self) -> &str {
        &self.video_ref
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// An ordered sequence of lessons.
///
/// Positions are guaranteed to be `0..n` in order, so a lesson's index in
/// `lessons()` equals its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    title: String,
    lessons: Vec<Lesson>,
    next_course: Option<CourseId>,
}

impl Course {
    /// Creates a course from lessons, sorting them by position.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the title is blank, the list is empty, a
    /// lesson belongs to another course, an id repeats, or positions are not
    /// contiguous from zero.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        mut lessons: Vec<Lesson>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        if lessons.is_empty() {
            return Err(CourseError::NoLessons);
        }

        lessons.sort_by_key(Lesson::position);
        let mut seen = std::collections::HashSet::with_capacity(lessons.len());
        for (expected, lesson) in (0_u32..).zip(lessons.iter()) {
            if lesson.course_id() != id {
                return Err(CourseError::ForeignLesson {
                    lesson: lesson.id(),
                    expected: id,
                    found: lesson.course_id(),
                });
            }
            if !seen.insert(lesson.id()) {
                return Err(CourseError::DuplicateLesson(lesson.id()));
            }
            if lesson.position() != expected {
                return Err(CourseError::PositionGap {
                    lesson: lesson.id(),
                    expected,
                    found: lesson.position(),
                });
            }
        }

        Ok(Self {
            id,
            title,
            lessons,
            next_course: None,
        })
    }

    /// Sets the course that gets unlocked once this one is completed.
    #[must_use]
    pub fn with_next_course(mut self, next: CourseId) -> Self {
        self.next_course = Some(next);
        self
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn next_course(&self) -> Option<CourseId> {
        self.next_course
    }

    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id() == id)
    }

    #[must_use]
    pub fn index_of(&self, id: LessonId) -> Option<usize> {
        self.lessons.iter().position(|l| l.id() == id)
    }

    #[must_use]
    pub fn is_last(&self, id: LessonId) -> bool {
        self.lessons.last().is_some_and(|l| l.id() == id)
    }

    #[must_use]
    pub fn lesson_ids(&self) -> Vec<LessonId> {
        self.lessons.iter().map(Lesson::id).collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: u64, course: u64, position: u32) -> Lesson {
        Lesson::new(
            LessonId::new(id),
            CourseId::new(course),
            position,
            5,
            format!("Lesson {id}"),
            format!("video-{id}"),
        )
        .unwrap()
    }

    #[test]
    fn lesson_rejects_blank_title() {
        let err = Lesson::new(LessonId::new(1), CourseId::new(1), 0, 5, "  ", "v").unwrap_err();
        assert_eq!(err, LessonError::EmptyTitle);
    }

    #[test]
    fn course_sorts_lessons_by_position() {
        let course = Course::new(
            CourseId::new(1),
            "Intro",
            vec![lesson(3, 1, 2), lesson(1, 1, 0), lesson(2, 1, 1)],
        )
        .unwrap();

        assert_eq!(
            course.lesson_ids(),
            vec![LessonId::new(1), LessonId::new(2), LessonId::new(3)]
        );
        assert_eq!(course.index_of(LessonId::new(3)), Some(2));
        assert!(course.is_last(LessonId::new(3)));
        assert!(!course.is_last(LessonId::new(1)));
    }

    #[test]
    fn course_rejects_position_gaps() {
        let err = Course::new(CourseId::new(1), "Intro", vec![lesson(1, 1, 0), lesson(2, 1, 2)])
            .unwrap_err();
        assert_eq!(
            err,
            CourseError::PositionGap {
                lesson: LessonId::new(2),
                expected: 1,
                found: 2,
            }
        );
    }

    #[test]
    fn course_rejects_foreign_and_duplicate_lessons() {
        let err = Course::new(CourseId::new(1), "Intro", vec![lesson(1, 2, 0)]).unwrap_err();
        assert!(matches!(err, CourseError::ForeignLesson { .. }));

        let err = Course::new(CourseId::new(1), "Intro", vec![lesson(1, 1, 0), lesson(1, 1, 1)])
            .unwrap_err();
        assert_eq!(err, CourseError::DuplicateLesson(LessonId::new(1)));
    }

    #[test]
    fn course_requires_lessons() {
        let err = Course::new(CourseId::new(1), "Intro", Vec::new()).unwrap_err();
        assert_eq!(err, CourseError::NoLessons);
    }
}
