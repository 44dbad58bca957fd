//! Module and challenge completion records

use rusqlite::{Connection, params, Row};
use serde::Serialize;

use super::{new_id, now_timestamp};
use crate::error::TrailError;

/// A (user, target) completion record
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompletionRow {
    pub id: String,
    pub user_id: String,
    /// Module id or challenge id, depending on the table
    pub target_id: String,
    pub completed_at: String,
}

impl CompletionRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            target_id: row.get("target_id")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Completion totals for one user
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CompletionCounts {
    pub modules: u64,
    pub challenges: u64,
}

/// Whether `user_id` has finished `module_id`
pub fn is_module_completed(conn: &Connection, user_id: &str, module_id: &str) -> Result<bool, TrailError> {
    exists(conn, "SELECT 1 FROM module_completions WHERE user_id = ? AND module_id = ?", user_id, module_id)
}

/// Whether `user_id` has passed `challenge_id`
pub fn is_challenge_completed(conn: &Connection, user_id: &str, challenge_id: &str) -> Result<bool, TrailError> {
    exists(conn, "SELECT 1 FROM challenge_completions WHERE user_id = ? AND challenge_id = ?", user_id, challenge_id)
}

fn exists(conn: &Connection, sql: &str, a: &str, b: &str) -> Result<bool, TrailError> {
    let mut stmt = conn.prepare_cached(sql)?;
    Ok(stmt.exists(params![a, b])?)
}

/// Record a module completion; an existing record is kept as is
pub fn record_module_completion(
    conn: &Connection,
    user_id: &str,
    module_id: &str,
    completed_at: Option<&str>,
) -> Result<CompletionRow, TrailError> {
    let completed_at = completed_at.map(str::to_string).unwrap_or_else(now_timestamp);
    conn.execute(
        "INSERT OR IGNORE INTO module_completions (id, user_id, module_id, completed_at) VALUES (?, ?, ?, ?)",
        params![new_id(), user_id, module_id, completed_at],
    )?;

    let row = conn.query_row(
        "SELECT id, user_id, module_id AS target_id, completed_at FROM module_completions
         WHERE user_id = ? AND module_id = ?",
        params![user_id, module_id],
        |row| CompletionRow::from_row(row),
    )?;
    Ok(row)
}

/// Remove a module completion, returns false when there was none
pub fn remove_module_completion(conn: &Connection, user_id: &str, module_id: &str) -> Result<bool, TrailError> {
    let changes = conn.execute(
        "DELETE FROM module_completions WHERE user_id = ? AND module_id = ?",
        params![user_id, module_id],
    )?;
    Ok(changes > 0)
}

/// Record a challenge completion; an existing record is kept as is
pub fn record_challenge_completion(
    conn: &Connection,
    user_id: &str,
    challenge_id: &str,
    completed_at: Option<&str>,
) -> Result<CompletionRow, TrailError> {
    let completed_at = completed_at.map(str::to_string).unwrap_or_else(now_timestamp);
    conn.execute(
        "INSERT OR IGNORE INTO challenge_completions (id, user_id, challenge_id, completed_at) VALUES (?, ?, ?, ?)",
        params![new_id(), user_id, challenge_id, completed_at],
    )?;

    let row = conn.query_row(
        "SELECT id, user_id, challenge_id AS target_id, completed_at FROM challenge_completions
         WHERE user_id = ? AND challenge_id = ?",
        params![user_id, challenge_id],
        |row| CompletionRow::from_row(row),
    )?;
    Ok(row)
}

pub fn delete_module_completions(conn: &Connection, module_id: &str) -> Result<usize, TrailError> {
    Ok(conn.execute("DELETE FROM module_completions WHERE module_id = ?", params![module_id])?)
}

pub fn delete_challenge_completions(conn: &Connection, challenge_id: &str) -> Result<usize, TrailError> {
    Ok(conn.execute("DELETE FROM challenge_completions WHERE challenge_id = ?", params![challenge_id])?)
}

/// Count completions recorded for a user
pub fn counts_for_user(conn: &Connection, user_id: &str) -> Result<CompletionCounts, TrailError> {
    let modules: i64 = conn.query_row(
        "SELECT COUNT(*) FROM module_completions WHERE user_id = ?",
        params![user_id],
        |row| row.get(0),
    )?;
    let challenges: i64 = conn.query_row(
        "SELECT COUNT(*) FROM challenge_completions WHERE user_id = ?",
        params![user_id],
        |row| row.get(0),
    )?;

    Ok(CompletionCounts {
        modules: modules as u64,
        challenges: challenges as u64,
    })
}
