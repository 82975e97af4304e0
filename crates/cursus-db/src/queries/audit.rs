//! Append-only audit log of enrollment and certificate changes.

use rusqlite::Connection;

use crate::{DbError, Result};

/// Actor recorded for changes made by the ledger itself.
pub const SYSTEM_ACTOR: &str = "system";

/// A new audit entry.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    /// Admin user id, or [`SYSTEM_ACTOR`].
    pub actor: &'a str,
    pub action: &'a str,
    pub user_id: &'a str,
    pub course_id: &'a str,
    pub detail: serde_json::Value,
    pub created_at: u64,
}

/// A raw audit row.
#[derive(Debug, Clone)]
pub struct AuditRow {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub user_id: String,
    pub course_id: String,
    pub detail: serde_json::Value,
    pub created_at: u64,
}

/// Append an entry.
pub fn record(conn: &Connection, entry: &AuditEntry<'_>) -> Result<()> {
    let detail =
        serde_json::to_string(&entry.detail).map_err(|e| DbError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO audit_log (actor, action, user_id, course_id, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            entry.actor,
            entry.action,
            entry.user_id,
            entry.course_id,
            detail,
            entry.created_at as i64,
        ],
    )?;
    Ok(())
}

/// Entries for a pair, oldest first.
pub fn list_for_pair(conn: &Connection, user_id: &str, course_id: &str) -> Result<Vec<AuditRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, actor, action, user_id, course_id, detail, created_at
         FROM audit_log WHERE user_id = ?1 AND course_id = ?2
         ORDER BY created_at, id",
    )?;
    let raw = stmt
        .query_map([user_id, course_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(id, actor, action, user_id, course_id, detail, created_at)| {
            let detail = serde_json::from_str(&detail)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            Ok(AuditRow {
                id,
                actor,
                action,
                user_id,
                course_id,
                detail,
                created_at: created_at as u64,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_list() {
        let conn = crate::open_memory().expect("open");
        record(
            &conn,
            &AuditEntry {
                actor: SYSTEM_ACTOR,
                action: "enrollment_status_changed",
                user_id: "u1",
                course_id: "c1",
                detail: serde_json::json!({"from": "pending", "to": "active"}),
                created_at: 10,
            },
        )
        .expect("record");
        record(
            &conn,
            &AuditEntry {
                actor: "admin-1",
                action: "certificate_revoked",
                user_id: "u1",
                course_id: "c1",
                detail: serde_json::json!({}),
                created_at: 20,
            },
        )
        .expect("record");

        let rows = list_for_pair(&conn, "u1", "c1").expect("list");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].detail["to"], "active");
        assert_eq!(rows[1].actor, "admin-1");
        assert!(list_for_pair(&conn, "u2", "c1").expect("list").is_empty());
    }
}
