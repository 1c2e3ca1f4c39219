mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::*;

/// Outcome of trying to lock a session for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringClaim {
    /// The caller now owns the scoring pass.
    Claimed,
    /// Another pass holds the lock.
    InProgress,
    AlreadyScored,
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

const SESSION_COLUMNS: &str =
    "id, target_id, rubric, total_score, scoring_status, scored_at, created_at, scoring_claimed_at";

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let applied = schema::run_migrations(&conn)?;
        if applied > 0 {
            tracing::info!("Applied {} session schema migration(s)", applied);
        }
        Ok(())
    }

    // ============================================================
    // Target operations
    // ============================================================

    /// Store a freshly acquired target.
    ///
    /// An existing row with the same id is reused untouched, which is what
    /// happens every time the sentinel target is handed out.
    pub fn create_target(&self, acquired: &AcquiredTarget) -> Result<Target> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO targets (target_id, image_ref, description, created_at)
             VALUES (?, ?, NULL, ?)",
            (
                &acquired.target_id,
                &acquired.image_ref,
                Utc::now().to_rfc3339(),
            ),
        )?;

        load_target(&conn, &acquired.target_id)?
            .ok_or_else(|| anyhow::anyhow!("Target not found after insert"))
    }

    pub fn get_target(&self, id: &str) -> Result<Option<Target>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        load_target(&conn, id)
    }

    /// Replace the placeholder description. Returns false when the target
    /// already had a description (or does not exist); it is never
    /// overwritten twice.
    pub fn set_target_description(&self, id: &str, description: &Description) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE targets SET description = ? WHERE target_id = ? AND description IS NULL",
            (serde_json::to_string(description)?, id),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Session operations
    // ============================================================

    pub fn create_session(&self, target_id: &str) -> Result<Session> {
        let conn = self.conn.lock().expect("database lock poisoned");
        if load_target(&conn, target_id)?.is_none() {
            anyhow::bail!("Target not found: {}", target_id);
        }

        let now = Utc::now();
        conn.execute(
            "INSERT INTO sessions (target_id, total_score, scoring_status, created_at)
             VALUES (?, 0, 'open', ?)",
            (target_id, now.to_rfc3339()),
        )?;

        Ok(Session {
            id: conn.last_insert_rowid(),
            target_id: target_id.to_string(),
            notes: Vec::new(),
            rubric: None,
            total_score: UNSCORED,
            scoring_status: ScoringStatus::Open,
            created_at: now,
            scored_at: None,
            scoring_claimed_at: None,
        })
    }

    pub fn get_session(&self, id: i64) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        load_session(&conn, id)
    }

    /// All sessions, newest first.
    pub fn list_sessions(&self, unfinished_only: bool) -> Result<Vec<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let filter = if unfinished_only {
            "WHERE total_score = 0 AND scoring_status != 'scored'"
        } else {
            ""
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions {} ORDER BY created_at DESC, id DESC",
            SESSION_COLUMNS, filter
        ))?;

        let mut sessions = stmt
            .query_map([], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for session in &mut sessions {
            session.notes = load_notes(&conn, session.id)?;
        }

        Ok(sessions)
    }

    /// The most recently created session that has not been scored.
    pub fn find_unfinished_session(&self) -> Result<Option<Session>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let session = conn
            .query_row(
                &format!(
                    "SELECT {} FROM sessions
                     WHERE total_score = 0 AND scoring_status != 'scored'
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    SESSION_COLUMNS
                ),
                [],
                session_from_row,
            )
            .optional()?;

        match session {
            Some(mut session) => {
                session.notes = load_notes(&conn, session.id)?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    /// Append a note for a stage. Returns false when the session does not
    /// exist; fails when its notes are already locked for scoring.
    pub fn append_note(&self, session_id: i64, stage: u8, text: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let status: Option<String> = conn
            .query_row(
                "SELECT scoring_status FROM sessions WHERE id = ?",
                [session_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(status) = status else {
            return Ok(false);
        };
        if ScoringStatus::from_str(&status) != Some(ScoringStatus::Open) {
            anyhow::bail!("Session {} is locked for scoring", session_id);
        }

        conn.execute(
            "INSERT INTO session_notes (session_id, stage, text, created_at) VALUES (?, ?, ?, ?)",
            (session_id, stage, text, Utc::now().to_rfc3339()),
        )?;
        Ok(true)
    }

    // ============================================================
    // Scoring lifecycle
    // ============================================================

    /// Atomically move a session from `open` to `scoring`.
    ///
    /// Returns `None` when the session does not exist.
    pub fn claim_scoring(&self, session_id: i64) -> Result<Option<ScoringClaim>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE sessions SET scoring_status = 'scoring', scoring_claimed_at = ?
             WHERE id = ? AND scoring_status = 'open'",
            (Utc::now().to_rfc3339(), session_id),
        )?;
        if rows > 0 {
            return Ok(Some(ScoringClaim::Claimed));
        }

        let status: Option<String> = conn
            .query_row(
                "SELECT scoring_status FROM sessions WHERE id = ?",
                [session_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(status.map(|s| match ScoringStatus::from_str(&s) {
            Some(ScoringStatus::Scored) => ScoringClaim::AlreadyScored,
            _ => ScoringClaim::InProgress,
        }))
    }

    /// Re-stamp a claim whose pass is no longer running anywhere.
    ///
    /// Returns `false` when the session is not in `scoring` any more, e.g. a
    /// pass finished or gave up between the caller's check and this call.
    pub fn take_over_scoring(&self, session_id: i64) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE sessions SET scoring_claimed_at = ?
             WHERE id = ? AND scoring_status = 'scoring'",
            (Utc::now().to_rfc3339(), session_id),
        )?;
        Ok(rows > 0)
    }

    /// Write the result of a claimed scoring pass.
    pub fn record_score(&self, session_id: i64, rubric: &Rubric, total: f64) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE sessions
             SET rubric = ?, total_score = ?, scoring_status = 'scored', scored_at = ?
             WHERE id = ? AND scoring_status = 'scoring'",
            (
                serde_json::to_string(rubric)?,
                total,
                Utc::now().to_rfc3339(),
                session_id,
            ),
        )?;
        if rows == 0 {
            anyhow::bail!("Session {} is not being scored", session_id);
        }
        Ok(())
    }

    /// Give up a claim after a failed pass so the whole pass can be retried.
    pub fn release_scoring(&self, session_id: i64) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE sessions SET scoring_status = 'open', scoring_claimed_at = NULL
             WHERE id = ? AND scoring_status = 'scoring'",
            [session_id],
        )?;
        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn load_target(conn: &Connection, id: &str) -> Result<Option<Target>> {
    let target = conn
        .query_row(
            "SELECT target_id, image_ref, description, created_at FROM targets WHERE target_id = ?",
            [id],
            |row| {
                let description: Option<String> = row.get(2)?;
                Ok(Target {
                    id: row.get(0)?,
                    image_ref: row.get(1)?,
                    description: description.and_then(|d| serde_json::from_str(&d).ok()),
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                })
            },
        )
        .optional()?;
    Ok(target)
}

fn load_session(conn: &Connection, id: i64) -> Result<Option<Session>> {
    let session = conn
        .query_row(
            &format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS),
            [id],
            session_from_row,
        )
        .optional()?;

    match session {
        Some(mut session) => {
            session.notes = load_notes(conn, id)?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

fn load_notes(conn: &Connection, session_id: i64) -> Result<Vec<StageNote>> {
    let mut stmt = conn.prepare(
        "SELECT stage, text, created_at FROM session_notes WHERE session_id = ? ORDER BY id",
    )?;
    let notes = stmt
        .query_map([session_id], |row| {
            Ok(StageNote {
                stage: row.get(0)?,
                text: row.get(1)?,
                created_at: parse_datetime(row.get::<_, String>(2)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(notes)
}

/// Maps a row selected with `SESSION_COLUMNS`. Notes are loaded separately.
fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let rubric: Option<String> = row.get(2)?;
    Ok(Session {
        id: row.get(0)?,
        target_id: row.get(1)?,
        notes: Vec::new(),
        rubric: rubric.and_then(|r| serde_json::from_str(&r).ok()),
        total_score: row.get(3)?,
        scoring_status: ScoringStatus::from_str(&row.get::<_, String>(4)?)
            .unwrap_or(ScoringStatus::Open),
        scored_at: row.get::<_, Option<String>>(5)?.map(parse_datetime),
        created_at: parse_datetime(row.get::<_, String>(6)?),
        scoring_claimed_at: row.get::<_, Option<String>>(7)?.map(parse_datetime),
    })
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
