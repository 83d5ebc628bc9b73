use rusqlite::{params, Connection};
use serde_json::Value;

use crate::db::models::AuditEntry;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One admin action to append to the log.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub actor_id: Option<&'a str>,
    pub action: &'a str,
    pub target_type: &'a str,
    pub target_id: Option<&'a str>,
    pub details: Value,
}

pub fn record(conn: &Connection, event: &AuditEvent<'_>) -> Result<String, rusqlite::Error> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO audit_log (id, actor_id, action, target_type, target_id, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id,
            event.actor_id,
            event.action,
            event.target_type,
            event.target_id,
            event.details.to_string(),
        ],
    )?;
    Ok(id)
}

/// Audit after the primary write has already succeeded; failures are logged, never returned.
pub fn record_best_effort(pool: &DbPool, event: &AuditEvent<'_>) {
    let result = pool
        .get()
        .map_err(|e| e.to_string())
        .and_then(|conn| record(&conn, event).map_err(|e| e.to_string()));

    if let Err(e) = result {
        tracing::warn!(
            action = event.action,
            target_id = ?event.target_id,
            "Audit write failed: {}",
            e
        );
    }
}

/// Position after which the next page starts: `<created_at>|<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: String,
    pub id: String,
}

impl Cursor {
    pub fn parse(raw: &str) -> AppResult<Self> {
        let (created_at, id) = raw
            .split_once('|')
            .ok_or_else(|| AppError::BadRequest("Invalid cursor".into()))?;
        if created_at.is_empty() || id.is_empty() {
            return Err(AppError::BadRequest("Invalid cursor".into()));
        }
        Ok(Self {
            created_at: created_at.to_string(),
            id: id.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        format!("{}|{}", self.created_at, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct AuditPage {
    pub items: Vec<AuditEntry>,
    pub next_cursor: Option<String>,
}

pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Newest first, keyset-paginated on `(created_at, id)`.
pub fn list(conn: &Connection, cursor: Option<&Cursor>, limit: u32) -> AppResult<AuditPage> {
    let mut stmt = conn.prepare(
        "SELECT id, actor_id, action, target_type, target_id, details, created_at
         FROM audit_log
         WHERE ?1 IS NULL OR created_at < ?1 OR (created_at = ?1 AND id < ?2)
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )?;

    let (after_ts, after_id) = match cursor {
        Some(c) => (Some(c.created_at.as_str()), Some(c.id.as_str())),
        None => (None, None),
    };

    let items = stmt
        .query_map(params![after_ts, after_id, limit], |row| {
            let details: String = row.get(5)?;
            Ok(AuditEntry {
                id: row.get(0)?,
                actor_id: row.get(1)?,
                action: row.get(2)?,
                target_type: row.get(3)?,
                target_id: row.get(4)?,
                details: serde_json::from_str(&details).unwrap_or(Value::Null),
                created_at: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let next_cursor = if items.len() as u32 == limit {
        items.last().map(|last| {
            Cursor {
                created_at: last.created_at.clone(),
                id: last.id.clone(),
            }
            .encode()
        })
    } else {
        None
    };

    Ok(AuditPage { items, next_cursor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;
    use std::collections::HashSet;

    fn setup() -> (tempfile::TempDir, DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&tmp.path().join("audit.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (tmp, pool)
    }

    fn event(action: &str) -> AuditEvent<'_> {
        AuditEvent {
            actor_id: Some("admin-1"),
            action,
            target_type: "profile",
            target_id: Some("u1"),
            details: json!({ "is_pro": true }),
        }
    }

    #[test]
    fn cursor_parse_rejects_garbage() {
        assert!(Cursor::parse("no-separator").is_err());
        assert!(Cursor::parse("|id").is_err());
        assert!(Cursor::parse("2026-01-01T00:00:00.000Z|").is_err());

        let c = Cursor::parse("2026-01-01T00:00:00.000Z|abc").unwrap();
        assert_eq!(c.id, "abc");
        assert_eq!(c.encode(), "2026-01-01T00:00:00.000Z|abc");
    }

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), MAX_PAGE_SIZE);
    }

    #[test]
    fn pagination_visits_every_entry_once() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();

        // Same timestamp for a batch forces the id tie-breaker
        for i in 0..7 {
            let id = format!("entry-{:02}", i);
            conn.execute(
                "INSERT INTO audit_log (id, action, target_type, created_at) VALUES (?1, 'x', 'profile', ?2)",
                params![id, if i < 4 { "2026-01-01T00:00:00.000Z" } else { "2026-01-02T00:00:00.000Z" }],
            )
            .unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let page = list(&conn, cursor.as_ref(), 3).unwrap();
            seen.extend(page.items.iter().map(|e| e.id.clone()));
            match page.next_cursor {
                Some(raw) => cursor = Some(Cursor::parse(&raw).unwrap()),
                None => break,
            }
        }

        assert_eq!(seen.len(), 7);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 7);
        assert_eq!(seen.first().map(String::as_str), Some("entry-06"));
        assert_eq!(seen.last().map(String::as_str), Some("entry-00"));
    }

    #[test]
    fn record_stores_details_as_json() {
        let (_tmp, pool) = setup();
        let conn = pool.get().unwrap();
        record(&conn, &event("flags.update")).unwrap();

        let page = list(&conn, None, 10).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].details["is_pro"], true);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn best_effort_swallows_failures() {
        let (_tmp, pool) = setup();
        pool.get()
            .unwrap()
            .execute_batch("DROP TABLE audit_log")
            .unwrap();
        // Must not panic or propagate
        record_best_effort(&pool, &event("ugc.moderate"));
    }
}
