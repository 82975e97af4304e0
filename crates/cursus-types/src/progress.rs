//! Per-lesson progress records.

use serde::{Deserialize, Serialize};

use crate::{CourseId, LessonId, ModuleId, UserId};

/// Status of a single lesson for a single user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    InProgress,
    Completed,
}

crate::status_enum!(LessonStatus, "lesson status", {
    InProgress => "in_progress",
    Completed => "completed",
});

/// Stored progress for `(user_id, course_id, lesson_id)`.
///
/// Once `status` is `Completed` it never reverts and `completed_at` never
/// changes. `max_watched_second` and `percent` are high-water marks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub lesson_id: LessonId,
    pub status: LessonStatus,
    pub percent: u8,
    pub max_watched_second: u64,
    pub completed_at: Option<u64>,
    pub updated_at: u64,
}

impl LessonProgress {
    pub fn is_completed(&self) -> bool {
        self.status == LessonStatus::Completed
    }
}

/// A progress event as reported by the lesson player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct ProgressObservation {
    pub status: LessonStatus,
    #[serde(default)]
    pub percent: Option<u8>,
    #[serde(default)]
    pub max_watched_second: Option<u64>,
}

impl ProgressObservation {
    pub fn completed() -> Self {
        Self {
            status: LessonStatus::Completed,
            percent: None,
            max_watched_second: None,
        }
    }

    pub fn watching(max_watched_second: u64) -> Self {
        Self {
            status: LessonStatus::InProgress,
            percent: None,
            max_watched_second: Some(max_watched_second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_optional_fields() {
        let obs: ProgressObservation =
            serde_json::from_str(r#"{"status":"in_progress"}"#).expect("parse");
        assert_eq!(obs.status, LessonStatus::InProgress);
        assert_eq!(obs.percent, None);
        assert_eq!(obs.max_watched_second, None);

        let obs: ProgressObservation =
            serde_json::from_str(r#"{"status":"completed","max_watched_second":310}"#)
                .expect("parse");
        assert_eq!(obs.status, LessonStatus::Completed);
        assert_eq!(obs.max_watched_second, Some(310));
    }
}
