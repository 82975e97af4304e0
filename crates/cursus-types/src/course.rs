//! Course catalog records.
//!
//! Courses, modules and lessons are owned by the content-management side of the
//! platform. The ledger only reads them: to decide whether a course is
//! available, to validate lesson references, and to learn the lesson count.

use serde::{Deserialize, Serialize};

use crate::{CourseId, LessonId, ModuleId};

/// Lifecycle of a course.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Open,
    /// Closed to new students; existing enrollments keep their access.
    Closed,
    /// Withdrawn for everyone, including administrators.
    Archived,
}

crate::status_enum!(CourseStatus, "course status", {
    Draft => "draft",
    Open => "open",
    Closed => "closed",
    Archived => "archived",
});

/// A course as seen by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub is_published: bool,
    pub status: CourseStatus,
    /// Cached count of published lessons.
    pub lesson_count: u32,
    /// Bumped by the content side whenever the curriculum changes.
    pub content_revision: u32,
}

impl Course {
    /// True when no student may consume the course: unpublished or archived.
    /// `Closed` courses stay readable for enrolled students.
    pub fn is_globally_blocked(&self) -> bool {
        !self.is_published || self.status == CourseStatus::Archived
    }
}

/// A lesson inside a course module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub title: String,
    pub position: u32,
    pub is_published: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(is_published: bool, status: CourseStatus) -> Course {
        Course {
            id: "c1".into(),
            title: "Watercolour Basics".into(),
            is_published,
            status,
            lesson_count: 10,
            content_revision: 1,
        }
    }

    #[test]
    fn test_closed_course_is_not_blocked() {
        assert!(!course(true, CourseStatus::Closed).is_globally_blocked());
        assert!(!course(true, CourseStatus::Open).is_globally_blocked());
    }

    #[test]
    fn test_archived_or_unpublished_is_blocked() {
        assert!(course(true, CourseStatus::Archived).is_globally_blocked());
        assert!(course(false, CourseStatus::Open).is_globally_blocked());
        assert!(course(false, CourseStatus::Draft).is_globally_blocked());
    }
}
