use std::collections::HashSet;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// One forward-only schema step. Versions sort lexically.
struct Migration {
    version: &'static str,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001",
        name: "initial",
        sql: include_str!("migrations/001_initial.sql"),
    },
    Migration {
        version: "002",
        name: "scoring_claimed_at",
        sql: include_str!("migrations/002_scoring_claimed_at.sql"),
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each step and its bookkeeping row commit together. Returns how many steps
/// ran.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .context("Failed to create schema_migrations table")?;

    let applied = applied_versions(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(m.version))
        .collect();

    if pending.is_empty() {
        tracing::debug!("Session schema is up to date ({} migrations)", applied.len());
        return Ok(0);
    }

    for migration in &pending {
        apply(conn, migration).with_context(|| {
            format!(
                "Failed to apply migration {} ({})",
                migration.version, migration.name
            )
        })?;
    }
    Ok(pending.len())
}

fn applied_versions(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(versions)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    tracing::info!(
        "Migrating session schema to {} ({})",
        migration.version,
        migration.name
    );

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
        (
            migration.version,
            migration.name,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    tx.commit()?;
    Ok(())
}
