//! Payment-signal ledger.
//!
//! Each processor event id moves through `processing -> done` or
//! `processing -> error -> processing ...`. A claim is committed on its own
//! before the signal is applied, so concurrent deliveries of the same event
//! see it in flight instead of applying it twice.

use rusqlite::{Connection, OptionalExtension};

use cursus_types::ParseStatusError;

use super::status_column;
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventState {
    Processing,
    Done,
    Error,
}

impl EventState {
    pub fn as_str(self) -> &'static str {
        match self {
            EventState::Processing => "processing",
            EventState::Done => "done",
            EventState::Error => "error",
        }
    }

}

impl std::str::FromStr for EventState {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "processing" => Ok(EventState::Processing),
            "done" => Ok(EventState::Done),
            "error" => Ok(EventState::Error),
            other => Err(ParseStatusError {
                kind: "payment event state",
                value: other.to_string(),
            }),
        }
    }
}

/// A raw payment-event row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEventRow {
    pub event_id: String,
    pub user_id: String,
    pub course_id: String,
    pub kind: String,
    pub state: EventState,
    pub last_error: Option<String>,
    pub attempts: u32,
    pub received_at: u64,
    pub updated_at: u64,
}

/// Outcome of [`claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// First delivery; the caller now owns the event.
    Fresh,
    /// A previous attempt failed or went stale; the caller owns the retry.
    Retry { attempts: u32 },
    /// Another delivery is applying this event right now.
    InFlight,
    /// Already applied.
    AlreadyDone,
}

/// Get an event row by id.
pub fn find(conn: &Connection, event_id: &str) -> Result<Option<PaymentEventRow>> {
    let row = conn
        .query_row(
            "SELECT event_id, user_id, course_id, kind, state, last_error, attempts,
                    received_at, updated_at
             FROM payment_events WHERE event_id = ?1",
            [event_id],
            |row| {
                Ok(PaymentEventRow {
                    event_id: row.get(0)?,
                    user_id: row.get(1)?,
                    course_id: row.get(2)?,
                    kind: row.get(3)?,
                    state: status_column(row, 4)?,
                    last_error: row.get(5)?,
                    attempts: row.get::<_, i64>(6)? as u32,
                    received_at: row.get::<_, i64>(7)? as u64,
                    updated_at: row.get::<_, i64>(8)? as u64,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// Claim an event for processing.
///
/// A `processing` row older than `stale_after_secs` is treated like an
/// `error` row: its owner is presumed dead and the event may be retried.
/// Must run inside [`crate::transact`] so the read and the write are atomic.
pub fn claim(
    conn: &Connection,
    event_id: &str,
    user_id: &str,
    course_id: &str,
    kind: &str,
    now: u64,
    stale_after_secs: u64,
) -> Result<Claim> {
    let Some(existing) = find(conn, event_id)? else {
        conn.execute(
            "INSERT INTO payment_events
                (event_id, user_id, course_id, kind, state, attempts, received_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'processing', 1, ?5, ?5)",
            rusqlite::params![event_id, user_id, course_id, kind, now as i64],
        )?;
        return Ok(Claim::Fresh);
    };

    let stale = now.saturating_sub(existing.updated_at) >= stale_after_secs;
    match existing.state {
        EventState::Done => Ok(Claim::AlreadyDone),
        EventState::Processing if !stale => Ok(Claim::InFlight),
        EventState::Processing | EventState::Error => {
            let attempts = existing.attempts + 1;
            conn.execute(
                "UPDATE payment_events
                 SET state = 'processing', attempts = ?2, updated_at = ?3
                 WHERE event_id = ?1",
                rusqlite::params![event_id, attempts as i64, now as i64],
            )?;
            Ok(Claim::Retry { attempts })
        }
    }
}

/// Mark an event as applied.
pub fn mark_done(conn: &Connection, event_id: &str, now: u64) -> Result<()> {
    conn.execute(
        "UPDATE payment_events SET state = 'done', last_error = NULL, updated_at = ?2
         WHERE event_id = ?1",
        rusqlite::params![event_id, now as i64],
    )?;
    Ok(())
}

/// Mark an event as failed so a later delivery may retry it.
pub fn mark_error(conn: &Connection, event_id: &str, message: &str, now: u64) -> Result<()> {
    conn.execute(
        "UPDATE payment_events SET state = 'error', last_error = ?2, updated_at = ?3
         WHERE event_id = ?1",
        rusqlite::params![event_id, message, now as i64],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STALE: u64 = 300;

    fn claim_at(conn: &Connection, now: u64) -> Claim {
        claim(conn, "evt_1", "u1", "c1", "payment_succeeded", now, STALE).expect("claim")
    }

    #[test]
    fn test_first_claim_is_fresh() {
        let conn = crate::open_memory().expect("open");
        assert_eq!(claim_at(&conn, 1000), Claim::Fresh);
        let row = find(&conn, "evt_1").expect("find").expect("row");
        assert_eq!(row.state, EventState::Processing);
        assert_eq!(row.kind, "payment_succeeded");
    }

    #[test]
    fn test_concurrent_delivery_sees_in_flight() {
        let conn = crate::open_memory().expect("open");
        claim_at(&conn, 1000);
        let second = claim_at(&conn, 1001);
        assert_eq!(second, Claim::InFlight);
    }

    #[test]
    fn test_done_is_not_reapplied() {
        let conn = crate::open_memory().expect("open");
        claim_at(&conn, 1000);
        mark_done(&conn, "evt_1", 1001).expect("done");
        assert_eq!(claim_at(&conn, 5000), Claim::AlreadyDone);
    }

    #[test]
    fn test_error_may_be_retried() {
        let conn = crate::open_memory().expect("open");
        claim_at(&conn, 1000);
        mark_error(&conn, "evt_1", "store unavailable", 1001).expect("error");
        let row = find(&conn, "evt_1").expect("find").expect("row");
        assert_eq!(row.last_error.as_deref(), Some("store unavailable"));

        assert_eq!(claim_at(&conn, 1002), Claim::Retry { attempts: 2 });
        mark_done(&conn, "evt_1", 1003).expect("done");
        let row = find(&conn, "evt_1").expect("find").expect("row");
        assert_eq!(row.state, EventState::Done);
        assert_eq!(row.last_error, None);
    }

    #[test]
    fn test_stale_processing_is_reclaimed() {
        let conn = crate::open_memory().expect("open");
        claim_at(&conn, 1000);
        assert_eq!(claim_at(&conn, 1000 + STALE - 1), Claim::InFlight);
        assert_eq!(claim_at(&conn, 1000 + STALE), Claim::Retry { attempts: 2 });
    }

    #[test]
    fn test_corrupt_state_is_an_error() {
        let conn = crate::open_memory().expect("open");
        claim_at(&conn, 1000);
        conn.execute_batch(
            "PRAGMA ignore_check_constraints = ON;
             UPDATE payment_events SET state = 'bogus' WHERE event_id = 'evt_1';
             PRAGMA ignore_check_constraints = OFF;",
        )
        .expect("corrupt");
        assert!(matches!(
            find(&conn, "evt_1"),
            Err(crate::DbError::Sqlite(rusqlite::Error::FromSqlConversionFailure(4, _, _)))
        ));
    }
}
