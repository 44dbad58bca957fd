//! SQLite database module for trails, categories, modules and progress
//!
//! ## Tables
//!
//! - `trails` - Named learning tracks
//! - `categories` - Ordered segments of a trail (`order_index` 1..N per trail)
//! - `modules` / `module_contents` - Learning units and their links
//! - `challenges` / `challenge_questions` / `question_alternatives` - Gating quizzes
//! - `module_completions` / `challenge_completions` - Per-user progress records
//! - `users` - Learner and admin profiles
//!
//! Repository functions take `&Connection` so they run unchanged inside a
//! `rusqlite::Transaction` (which derefs to `Connection`). Deletes cascade
//! explicitly: each repository removes its dependents before its own row.

pub mod schema;
pub mod trails;
pub mod categories;
pub mod modules;
pub mod challenges;
pub mod completions;
pub mod users;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::TrailError;

/// SQLite database for the learning platform
pub struct LearningDb {
    conn: Mutex<Connection>,
}

impl LearningDb {
    /// Open or create the database in `storage_dir`
    pub fn open(storage_dir: &Path) -> Result<Self, TrailError> {
        let db_path = storage_dir.join("learning.db");
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| TrailError::Internal(format!("Failed to open SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| TrailError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, TrailError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| TrailError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), TrailError> {
        self.with_conn(schema::init_schema)
    }

    /// Run a read operation against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, TrailError>
    where
        F: FnOnce(&Connection) -> Result<T, TrailError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| TrailError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, TrailError>
    where
        F: FnOnce(&mut Connection) -> Result<T, TrailError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| TrailError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Run `f` inside a single transaction, committing only if it succeeds
    pub fn transaction<F, T>(&self, f: F) -> Result<T, TrailError>
    where
        F: FnOnce(&Connection) -> Result<T, TrailError>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let value = f(&*tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, TrailError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, TrailError> {
                let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                trail_count: count("trails")?,
                category_count: count("categories")?,
                module_count: count("modules")?,
                challenge_count: count("challenges")?,
                user_count: count("users")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub trail_count: u64,
    pub category_count: u64,
    pub module_count: u64,
    pub challenge_count: u64,
    pub user_count: u64,
}

/// Generate a new row id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current time as an RFC 3339 string
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

// Re-exports
pub use trails::{TrailRow, TrailOutline, CategoryOutline};
pub use categories::CategoryRow;
pub use modules::{ModuleRow, ModuleContentRow, ContentType};
pub use challenges::{ChallengeRow, QuestionRow, AlternativeRow, NewAlternative};
pub use completions::{CompletionRow, CompletionCounts};
pub use users::UserRow;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_on_empty_db() {
        let db = LearningDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.trail_count, 0);
        assert_eq!(stats.user_count, 0);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = LearningDb::open_in_memory().unwrap();

        let result: Result<(), TrailError> = db.transaction(|conn| {
            trails::create_trail(conn, "Frontend")?;
            Err(TrailError::Internal("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.stats().unwrap().trail_count, 0);
    }
}
