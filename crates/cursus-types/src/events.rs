//! Domain events published by the daemon for downstream collaborators
//! (notifications, gamification, analytics).

use serde::{Deserialize, Serialize};

/// Envelope for all ledger events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: u64,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(event_type: EventType, timestamp: u64, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            timestamp,
            payload,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Progress events
    LessonCompleted,
    CourseCompleted,

    // Certificate events
    CertificateIssued,
    CertificateRevoked,

    // Enrollment events
    EnrollmentStatusChanged,
    EnrollmentRevoked,
    PaymentSignalApplied,

    // System events
    DaemonStarted,
}

impl EventType {
    /// Coarse category used by subscribers to filter the stream.
    pub fn category(self) -> &'static str {
        match self {
            EventType::LessonCompleted | EventType::CourseCompleted => "progress",
            EventType::CertificateIssued | EventType::CertificateRevoked => "certificate",
            EventType::EnrollmentStatusChanged
            | EventType::EnrollmentRevoked
            | EventType::PaymentSignalApplied => "enrollment",
            EventType::DaemonStarted => "system",
        }
    }
}
