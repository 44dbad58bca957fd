//! Trail CRUD operations and the ordered trail outline

use rusqlite::{Connection, OptionalExtension, params, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{categories, challenges, modules, new_id};
use super::modules::ModuleRow;
use crate::error::TrailError;

/// Trail row from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrailRow {
    pub id: String,
    pub name: String,
}

impl TrailRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
        })
    }
}

/// A trail with its categories ascending by order, each carrying its
/// modules and the id of its challenge (if any)
#[derive(Debug, Clone, Serialize)]
pub struct TrailOutline {
    pub id: String,
    pub name: String,
    pub categories: Vec<CategoryOutline>,
}

/// One category inside a [`TrailOutline`]
#[derive(Debug, Clone, Serialize)]
pub struct CategoryOutline {
    pub id: String,
    pub name: String,
    pub order_index: i64,
    pub modules: Vec<ModuleRow>,
    pub challenge_id: Option<String>,
}

/// Get trail by ID
pub fn get_trail(conn: &Connection, id: &str) -> Result<Option<TrailRow>, TrailError> {
    let trail = conn
        .query_row("SELECT id, name FROM trails WHERE id = ?", params![id], |row| TrailRow::from_row(row))
        .optional()?;
    Ok(trail)
}

/// Check whether a trail exists
pub fn trail_exists(conn: &Connection, id: &str) -> Result<bool, TrailError> {
    let exists = conn
        .query_row("SELECT 1 FROM trails WHERE id = ?", params![id], |_| Ok(()))
        .optional()?
        .is_some();
    Ok(exists)
}

/// Check whether `name` is used by a trail other than `except_id`
pub fn name_taken(conn: &Connection, name: &str, except_id: Option<&str>) -> Result<bool, TrailError> {
    let taken = conn
        .query_row(
            "SELECT 1 FROM trails WHERE name = ?1 AND (?2 IS NULL OR id != ?2)",
            params![name, except_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(taken)
}

/// List all trails sorted by name
pub fn list_trails(conn: &Connection) -> Result<Vec<TrailRow>, TrailError> {
    let mut stmt = conn.prepare("SELECT id, name FROM trails ORDER BY name ASC")?;
    let trails = stmt
        .query_map([], |row| TrailRow::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(trails)
}

/// Insert a trail
pub fn create_trail(conn: &Connection, name: &str) -> Result<TrailRow, TrailError> {
    let trail = TrailRow {
        id: new_id(),
        name: name.to_string(),
    };

    conn.execute(
        "INSERT INTO trails (id, name) VALUES (?, ?)",
        params![trail.id, trail.name],
    )?;

    Ok(trail)
}

/// Rename a trail, returns false when it does not exist
pub fn rename_trail(conn: &Connection, id: &str, name: &str) -> Result<bool, TrailError> {
    let changes = conn.execute("UPDATE trails SET name = ? WHERE id = ?", params![name, id])?;
    Ok(changes > 0)
}

/// Delete a trail together with its categories
pub fn delete_trail(conn: &Connection, id: &str) -> Result<bool, TrailError> {
    for category in categories::list_categories(conn, Some(id))? {
        categories::delete_category(conn, &category.id)?;
    }

    let changes = conn.execute("DELETE FROM trails WHERE id = ?", params![id])?;
    Ok(changes > 0)
}

/// Load the trail with categories ascending by order, each with modules and challenge
pub fn get_trail_outline(conn: &Connection, id: &str) -> Result<Option<TrailOutline>, TrailError> {
    let trail = match get_trail(conn, id)? {
        Some(t) => t,
        None => return Ok(None),
    };

    let mut outline = TrailOutline {
        id: trail.id,
        name: trail.name,
        categories: vec![],
    };

    for category in categories::list_categories(conn, Some(id))? {
        let modules = modules::list_modules(conn, Some(&category.id))?;
        let challenge_id = challenges::challenge_for_category(conn, &category.id)?.map(|c| c.id);

        outline.categories.push(CategoryOutline {
            id: category.id,
            name: category.name,
            order_index: category.order_index,
            modules,
            challenge_id,
        });
    }

    debug!(trail_id = %id, categories = outline.categories.len(), "Loaded trail outline");
    Ok(Some(outline))
}
