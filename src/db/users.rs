//! User profile storage

use rusqlite::{Connection, OptionalExtension, params, Row};
use serde::{Deserialize, Serialize};

use super::{new_id, now_timestamp};
use crate::error::TrailError;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_ADMIN: &str = "admin";

/// User row from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    /// ISO date (YYYY-MM-DD)
    pub birth_date: String,
    pub role: String,
    pub created_at: String,
}

impl UserRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            full_name: row.get("full_name")?,
            email: row.get("email")?,
            birth_date: row.get("birth_date")?,
            role: row.get("role")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

const USER_COLUMNS: &str = "id, full_name, email, birth_date, role, created_at";

/// Get user by ID
pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>, TrailError> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            params![id],
            |row| UserRow::from_row(row),
        )
        .optional()?;
    Ok(user)
}

/// Get user by email
pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, TrailError> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS),
            params![email],
            |row| UserRow::from_row(row),
        )
        .optional()?;
    Ok(user)
}

/// List all users by name
pub fn list_users(conn: &Connection) -> Result<Vec<UserRow>, TrailError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY full_name ASC", USER_COLUMNS))?;
    let users = stmt
        .query_map([], |row| UserRow::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Insert a user
pub fn create_user(
    conn: &Connection,
    full_name: &str,
    email: &str,
    birth_date: &str,
    role: &str,
) -> Result<UserRow, TrailError> {
    let user = UserRow {
        id: new_id(),
        full_name: full_name.to_string(),
        email: email.to_string(),
        birth_date: birth_date.to_string(),
        role: role.to_string(),
        created_at: now_timestamp(),
    };

    conn.execute(
        "INSERT INTO users (id, full_name, email, birth_date, role, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        params![user.id, user.full_name, user.email, user.birth_date, user.role, user.created_at],
    )?;

    Ok(user)
}
