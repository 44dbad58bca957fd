//! Category CRUD operations

use rusqlite::{Connection, OptionalExtension, params, Row};
use serde::{Deserialize, Serialize};

use super::{challenges, modules, new_id};
use crate::error::TrailError;

/// Category row from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRow {
    pub id: String,
    pub trail_id: String,
    pub name: String,
    pub order_index: i64,
}

impl CategoryRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            trail_id: row.get("trail_id")?,
            name: row.get("name")?,
            order_index: row.get("order_index")?,
        })
    }
}

/// Get category by ID
pub fn get_category(conn: &Connection, id: &str) -> Result<Option<CategoryRow>, TrailError> {
    let category = conn
        .query_row(
            "SELECT id, trail_id, name, order_index FROM categories WHERE id = ?",
            params![id],
            |row| CategoryRow::from_row(row),
        )
        .optional()?;
    Ok(category)
}

/// List categories ascending by order, optionally restricted to one trail
pub fn list_categories(conn: &Connection, trail_id: Option<&str>) -> Result<Vec<CategoryRow>, TrailError> {
    let mut stmt = conn.prepare(
        "SELECT id, trail_id, name, order_index FROM categories
         WHERE (?1 IS NULL OR trail_id = ?1)
         ORDER BY order_index ASC, rowid ASC",
    )?;

    let categories = stmt
        .query_map(params![trail_id], |row| CategoryRow::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Number of categories currently in a trail
pub fn count_for_trail(conn: &Connection, trail_id: &str) -> Result<usize, TrailError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE trail_id = ?",
        params![trail_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Insert a category at the end of its trail (order = sibling count + 1)
pub fn create_category(conn: &Connection, trail_id: &str, name: &str) -> Result<CategoryRow, TrailError> {
    let category = CategoryRow {
        id: new_id(),
        trail_id: trail_id.to_string(),
        name: name.to_string(),
        order_index: count_for_trail(conn, trail_id)? as i64 + 1,
    };

    conn.execute(
        "INSERT INTO categories (id, trail_id, name, order_index) VALUES (?, ?, ?, ?)",
        params![category.id, category.trail_id, category.name, category.order_index],
    )?;

    Ok(category)
}

/// Persist name, trail and order of an existing category
pub fn update_category(conn: &Connection, category: &CategoryRow) -> Result<bool, TrailError> {
    let changes = conn.execute(
        "UPDATE categories SET trail_id = ?, name = ?, order_index = ? WHERE id = ?",
        params![category.trail_id, category.name, category.order_index, category.id],
    )?;
    Ok(changes > 0)
}

/// Set the order of a single category
pub fn set_order(conn: &Connection, id: &str, order_index: i64) -> Result<bool, TrailError> {
    let changes = conn.execute(
        "UPDATE categories SET order_index = ? WHERE id = ?",
        params![order_index, id],
    )?;
    Ok(changes > 0)
}

/// Delete a category with its modules and challenge. Does not renumber siblings.
pub fn delete_category(conn: &Connection, id: &str) -> Result<bool, TrailError> {
    if let Some(challenge) = challenges::challenge_for_category(conn, id)? {
        challenges::delete_challenge(conn, &challenge.id)?;
    }

    for module in modules::list_modules(conn, Some(id))? {
        modules::delete_module(conn, &module.id)?;
    }

    let changes = conn.execute("DELETE FROM categories WHERE id = ?", params![id])?;
    Ok(changes > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;
    use crate::db::trails;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_create_appends_order() {
        let conn = conn();
        let trail = trails::create_trail(&conn, "Frontend").unwrap();
        let other = trails::create_trail(&conn, "Backend").unwrap();

        let a = create_category(&conn, &trail.id, "Internet").unwrap();
        let b = create_category(&conn, &trail.id, "HTML").unwrap();
        let c = create_category(&conn, &other.id, "SQL").unwrap();

        assert_eq!(a.order_index, 1);
        assert_eq!(b.order_index, 2);
        assert_eq!(c.order_index, 1);
        assert_eq!(count_for_trail(&conn, &trail.id).unwrap(), 2);
    }

    #[test]
    fn test_list_filters_by_trail() {
        let conn = conn();
        let trail = trails::create_trail(&conn, "Frontend").unwrap();
        let other = trails::create_trail(&conn, "Backend").unwrap();
        create_category(&conn, &trail.id, "Internet").unwrap();
        create_category(&conn, &other.id, "SQL").unwrap();

        assert_eq!(list_categories(&conn, Some(&trail.id)).unwrap().len(), 1);
        assert_eq!(list_categories(&conn, None).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_cascades_modules_and_challenge() {
        let conn = conn();
        let trail = trails::create_trail(&conn, "Frontend").unwrap();
        let category = create_category(&conn, &trail.id, "HTML").unwrap();
        modules::create_module(&conn, &category.id, "Tags", "Basic tags").unwrap();
        challenges::create_challenge(&conn, &category.id).unwrap();

        assert!(delete_category(&conn, &category.id).unwrap());

        let modules_left: i64 = conn.query_row("SELECT COUNT(*) FROM modules", [], |r| r.get(0)).unwrap();
        let challenges_left: i64 = conn.query_row("SELECT COUNT(*) FROM challenges", [], |r| r.get(0)).unwrap();
        assert_eq!(modules_left, 0);
        assert_eq!(challenges_left, 0);
        assert!(!delete_category(&conn, &category.id).unwrap());
    }
}
