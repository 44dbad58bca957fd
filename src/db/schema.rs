//! Database schema definitions

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::TrailError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), TrailError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, TrailError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), TrailError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])?;
    Ok(())
}

fn create_tables(conn: &Connection) -> Result<(), TrailError> {
    conn.execute_batch(USERS_SCHEMA)
        .map_err(|e| TrailError::Internal(format!("Failed to create users table: {}", e)))?;

    conn.execute_batch(TRAILS_SCHEMA)
        .map_err(|e| TrailError::Internal(format!("Failed to create trail tables: {}", e)))?;

    conn.execute_batch(CHALLENGES_SCHEMA)
        .map_err(|e| TrailError::Internal(format!("Failed to create challenge tables: {}", e)))?;

    conn.execute_batch(COMPLETIONS_SCHEMA)
        .map_err(|e| TrailError::Internal(format!("Failed to create completion tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| TrailError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), TrailError> {
    // No migrations exist yet past v1; stamp the current version
    debug!(from_version, "No migration steps to run");
    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

const USERS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    birth_date TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'student',
    created_at TEXT NOT NULL
);
"#;

const TRAILS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trails (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE
);

-- order_index is 1-based and contiguous within a trail
CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY NOT NULL,
    trail_id TEXT NOT NULL,
    name TEXT NOT NULL,
    order_index INTEGER NOT NULL,

    FOREIGN KEY (trail_id) REFERENCES trails(id)
);

CREATE TABLE IF NOT EXISTS modules (
    id TEXT PRIMARY KEY NOT NULL,
    category_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',

    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS module_contents (
    id TEXT PRIMARY KEY NOT NULL,
    module_id TEXT NOT NULL,
    content_type TEXT NOT NULL,
    description TEXT NOT NULL,
    url TEXT NOT NULL,

    FOREIGN KEY (module_id) REFERENCES modules(id)
);
"#;

const CHALLENGES_SCHEMA: &str = r#"
-- UNIQUE category_id: at most one challenge per category
CREATE TABLE IF NOT EXISTS challenges (
    id TEXT PRIMARY KEY NOT NULL,
    category_id TEXT NOT NULL UNIQUE,

    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS challenge_questions (
    id TEXT PRIMARY KEY NOT NULL,
    challenge_id TEXT NOT NULL,
    question TEXT NOT NULL,
    module_id TEXT,
    position INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (challenge_id) REFERENCES challenges(id),
    FOREIGN KEY (module_id) REFERENCES modules(id)
);

CREATE TABLE IF NOT EXISTS question_alternatives (
    id TEXT PRIMARY KEY NOT NULL,
    question_id TEXT NOT NULL,
    text TEXT NOT NULL,
    is_correct INTEGER NOT NULL DEFAULT 0,
    position INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (question_id) REFERENCES challenge_questions(id)
);
"#;

const COMPLETIONS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS module_completions (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    module_id TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    UNIQUE (user_id, module_id),

    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (module_id) REFERENCES modules(id)
);

CREATE TABLE IF NOT EXISTS challenge_completions (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    challenge_id TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    UNIQUE (user_id, challenge_id),

    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (challenge_id) REFERENCES challenges(id)
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_categories_trail ON categories(trail_id, order_index);
CREATE INDEX IF NOT EXISTS idx_modules_category ON modules(category_id);
CREATE INDEX IF NOT EXISTS idx_module_contents_module ON module_contents(module_id);
CREATE INDEX IF NOT EXISTS idx_questions_challenge ON challenge_questions(challenge_id);
CREATE INDEX IF NOT EXISTS idx_questions_module ON challenge_questions(module_id);
CREATE INDEX IF NOT EXISTS idx_alternatives_question ON question_alternatives(question_id);
CREATE INDEX IF NOT EXISTS idx_module_completions_module ON module_completions(module_id);
CREATE INDEX IF NOT EXISTS idx_challenge_completions_challenge ON challenge_completions(challenge_id);
"#;
