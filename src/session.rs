//! Per-terminal session history in SQLite.
//!
//! A session is a bounded, time-limited window of command history tied to
//! one terminal instance. Sessions are created lazily on first use,
//! refreshed on every command, and deleted outright once idle past the
//! timeout. History keeps the 20 most recent entries per session with
//! output samples capped at 500 characters.

use crate::error::Result;
use crate::types::{HistoryRecord, ToolInfo};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const APP_NAME: &str = "nlsh";

pub const MAX_HISTORY: usize = 20;
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;
pub const OUTPUT_SAMPLE_CHARS: usize = 500;

pub fn get_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("sessions.db")
}

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fingerprint TEXT UNIQUE NOT NULL,
            created_at INTEGER NOT NULL,
            last_active INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id INTEGER NOT NULL,
            query TEXT NOT NULL,
            command TEXT NOT NULL,
            explanation TEXT NOT NULL,
            confidence INTEGER NOT NULL,
            exit_code INTEGER,
            stdout TEXT,
            stderr TEXT,
            cwd TEXT NOT NULL,
            timestamp INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tools (
            name TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            path TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Stable identity for the hosting terminal: parent process plus whatever
/// terminal markers the environment exposes.
pub fn terminal_fingerprint() -> String {
    #[cfg(unix)]
    let ppid = std::os::unix::process::parent_id();
    #[cfg(not(unix))]
    let ppid = 0u32;

    let mut hasher = Sha256::new();
    hasher.update(ppid.to_le_bytes());
    for var in ["TERM_SESSION_ID", "WINDOWID", "SSH_TTY", "TMUX_PANE"] {
        if let Ok(value) = std::env::var(var) {
            hasher.update(var.as_bytes());
            hasher.update(value.as_bytes());
        }
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

/// Finds or creates the session for this fingerprint, discarding expired
/// sessions first. Refreshes the activity timestamp either way.
pub fn claim_session(conn: &Connection, fingerprint: &str) -> Result<i64> {
    claim_session_at(conn, fingerprint, now())
}

pub fn claim_session_at(conn: &Connection, fingerprint: &str, now: i64) -> Result<i64> {
    prune_expired(conn, now)?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM sessions WHERE fingerprint = ?1",
            params![fingerprint],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE sessions SET last_active = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(id)
        }
        None => {
            conn.execute(
                "INSERT INTO sessions (fingerprint, created_at, last_active)
                 VALUES (?1, ?2, ?3)",
                params![fingerprint, now, now],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

fn prune_expired(conn: &Connection, now: i64) -> Result<()> {
    let cutoff = now - SESSION_TTL_SECS;
    conn.execute(
        "DELETE FROM history WHERE session_id IN
            (SELECT id FROM sessions WHERE last_active < ?1)",
        params![cutoff],
    )?;
    conn.execute(
        "DELETE FROM sessions WHERE last_active < ?1",
        params![cutoff],
    )?;
    Ok(())
}

fn sample(text: &str) -> String {
    text.chars().take(OUTPUT_SAMPLE_CHARS).collect()
}

/// Appends a record, evicting the oldest entries beyond the history bound.
pub fn add_record(conn: &Connection, session_id: i64, record: &HistoryRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO history
            (session_id, query, command, explanation, confidence,
             exit_code, stdout, stderr, cwd, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            session_id,
            record.query,
            record.command,
            record.explanation,
            record.confidence as i64,
            record.exit_code,
            record.stdout.as_deref().map(sample),
            record.stderr.as_deref().map(sample),
            record.cwd,
            record.timestamp,
        ],
    )?;

    conn.execute(
        "DELETE FROM history WHERE session_id = ?1 AND id NOT IN
            (SELECT id FROM history WHERE session_id = ?1
             ORDER BY id DESC LIMIT ?2)",
        params![session_id, MAX_HISTORY as i64],
    )?;

    conn.execute(
        "UPDATE sessions SET last_active = ?1 WHERE id = ?2",
        params![record.timestamp, session_id],
    )?;

    Ok(())
}

/// Most recent records first.
pub fn recent_records(
    conn: &Connection,
    session_id: i64,
    limit: usize,
) -> Result<Vec<HistoryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT query, command, explanation, confidence, exit_code,
                stdout, stderr, cwd, timestamp
         FROM history WHERE session_id = ?1
         ORDER BY id DESC LIMIT ?2",
    )?;

    let records = stmt
        .query_map(params![session_id, limit as i64], |row| {
            Ok(HistoryRecord {
                query: row.get(0)?,
                command: row.get(1)?,
                explanation: row.get(2)?,
                confidence: row.get::<_, i64>(3)?.clamp(0, 100) as u8,
                exit_code: row.get(4)?,
                stdout: row.get(5)?,
                stderr: row.get(6)?,
                cwd: row.get(7)?,
                timestamp: row.get(8)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();

    Ok(records)
}

/// Text block summarizing the last `n` interactions, oldest first, for
/// use as prompt context.
pub fn context_summary(conn: &Connection, session_id: i64, n: usize) -> Result<String> {
    let mut records = recent_records(conn, session_id, n)?;
    if records.is_empty() {
        return Ok(String::new());
    }
    records.reverse();

    let mut lines = vec!["Recent interactions in this terminal:".to_string()];
    for record in records {
        let outcome = match record.exit_code {
            Some(0) => "ok".to_string(),
            Some(code) => format!("exit {code}"),
            None => "not run".to_string(),
        };
        lines.push(format!(
            "- asked: {} -> ran: {} ({})",
            record.query, record.command, outcome
        ));
    }
    Ok(lines.join("\n"))
}

// Tool inventory rows share the session database; see inventory.rs for
// discovery and categorization.

pub fn save_tool(conn: &Connection, tool: &ToolInfo, path: &str, updated_at: i64) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO tools (name, category, path, updated_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![tool.name, tool.category, path, updated_at],
    )?;
    Ok(())
}

pub fn load_tools(conn: &Connection) -> Result<Vec<ToolInfo>> {
    let mut stmt = conn.prepare("SELECT name, category FROM tools ORDER BY category, name")?;
    let tools = stmt
        .query_map([], |row| {
            Ok(ToolInfo {
                name: row.get(0)?,
                category: row.get(1)?,
            })
        })?
        .filter_map(|r| r.ok())
        .collect();
    Ok(tools)
}

pub fn clear_tools(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM tools", [])?;
    Ok(())
}

pub fn tool_count(conn: &Connection) -> u32 {
    conn.query_row("SELECT COUNT(*) FROM tools", [], |row| row.get(0))
        .unwrap_or(0)
}

pub fn tools_updated_at(conn: &Connection) -> Option<i64> {
    conn.query_row("SELECT MAX(updated_at) FROM tools", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
}
