// 🧾 Audit Log - Every comparison and every baseline swap is an event
// SQLite; the comparison core never touches it.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BaselineCompared,
    BaselineReplaced,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BaselineCompared => "baseline_compared",
            EventKind::BaselineReplaced => "baseline_replaced",
        }
    }

    fn from_column(raw: &str) -> Result<Self> {
        match raw {
            "baseline_compared" => Ok(EventKind::BaselineCompared),
            "baseline_replaced" => Ok(EventKind::BaselineReplaced),
            other => Err(anyhow!("Unknown audit event kind: {}", other)),
        }
    }
}

/// One audited operation against the baseline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub kind: EventKind,
    /// Fingerprint of the baseline involved, when it could be read
    pub baseline: Option<String>,
    pub actor: String,
    pub details: serde_json::Value,
}

impl Event {
    pub fn new(kind: EventKind, baseline: Option<String>, actor: &str, details: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            kind,
            baseline,
            actor: actor.to_string(),
            details,
        }
    }
}

// ============================================================================
// SCHEMA & QUERIES
// ============================================================================

const SELECT_EVENTS: &str = "SELECT id, recorded_at, kind, baseline, actor, details FROM audit_events";

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS audit_events (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            recorded_at TEXT NOT NULL,
            kind TEXT NOT NULL,
            baseline TEXT,
            actor TEXT NOT NULL,
            details TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_events_baseline ON audit_events(baseline);",
    )
    .context("Failed to create audit schema")?;

    Ok(())
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let details = serde_json::to_string(&event.details).context("Failed to encode event details")?;

    conn.execute(
        "INSERT INTO audit_events (id, recorded_at, kind, baseline, actor, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id,
            event.recorded_at.to_rfc3339(),
            event.kind.as_str(),
            event.baseline,
            event.actor,
            details,
        ],
    )
    .context("Failed to insert audit event")?;

    Ok(())
}

// Columns as stored, before timestamp/kind/JSON decoding
struct StoredEvent {
    id: String,
    recorded_at: String,
    kind: String,
    baseline: Option<String>,
    actor: String,
    details: String,
}

impl StoredEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(StoredEvent {
            id: row.get(0)?,
            recorded_at: row.get(1)?,
            kind: row.get(2)?,
            baseline: row.get(3)?,
            actor: row.get(4)?,
            details: row.get(5)?,
        })
    }

    fn decode(self) -> Result<Event> {
        Ok(Event {
            recorded_at: DateTime::parse_from_rfc3339(&self.recorded_at)
                .with_context(|| format!("Invalid event timestamp: {}", self.recorded_at))?
                .with_timezone(&Utc),
            kind: EventKind::from_column(&self.kind)?,
            details: serde_json::from_str(&self.details).context("Invalid event details")?,
            id: self.id,
            baseline: self.baseline,
            actor: self.actor,
        })
    }
}

fn query_events(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, StoredEvent::from_row)?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?.decode()?);
    }
    Ok(events)
}

/// Oldest first
pub fn events_for_baseline(conn: &Connection, fingerprint: &str) -> Result<Vec<Event>> {
    let sql = format!("{} WHERE baseline = ?1 ORDER BY seq ASC", SELECT_EVENTS);
    query_events(conn, &sql, params![fingerprint])
}

/// Newest first
pub fn recent_events(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
    let sql = format!("{} ORDER BY seq DESC LIMIT ?1", SELECT_EVENTS);
    query_events(conn, &sql, params![limit as i64])
}

pub fn count_events(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM audit_events", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// AUDIT LOG HANDLE
// ============================================================================

/// Owned connection with the schema already in place
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open audit database: {}", path.display()))?;
        ensure_schema(&conn)?;
        Ok(AuditLog { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn)?;
        Ok(AuditLog { conn })
    }

    pub fn record(&self, event: &Event) -> Result<()> {
        insert_event(&self.conn, event)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<Event>> {
        recent_events(&self.conn, limit)
    }

    pub fn for_baseline(&self, fingerprint: &str) -> Result<Vec<Event>> {
        events_for_baseline(&self.conn, fingerprint)
    }

    pub fn count(&self) -> Result<i64> {
        count_events(&self.conn)
    }
}

// ============================================================================
// TESTS
// ============================================================================
