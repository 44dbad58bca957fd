//! Module and module content CRUD operations

use std::fmt;
use std::str::FromStr;

use rusqlite::{Connection, OptionalExtension, params, Row};
use serde::{Deserialize, Serialize};

use super::{challenges, completions, new_id};
use crate::error::TrailError;

/// Module row from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleRow {
    pub id: String,
    pub category_id: String,
    pub title: String,
    pub description: String,
}

impl ModuleRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            category_id: row.get("category_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
        })
    }
}

/// Kind of material a module content links to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Document,
    Video,
    Blog,
    Image,
    Website,
}

impl ContentType {
    pub const ALL: [ContentType; 5] = [
        ContentType::Document,
        ContentType::Video,
        ContentType::Blog,
        ContentType::Image,
        ContentType::Website,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Document => "document",
            ContentType::Video => "video",
            ContentType::Blog => "blog",
            ContentType::Image => "image",
            ContentType::Website => "website",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = TrailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TrailError::field(
                "type",
                format!("type must be one of: document, video, blog, image, website (got '{}')", s),
            ))
    }
}

/// Module content row from database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleContentRow {
    pub id: String,
    pub module_id: String,
    pub content_type: String,
    pub description: String,
    pub url: String,
}

impl ModuleContentRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            module_id: row.get("module_id")?,
            content_type: row.get("content_type")?,
            description: row.get("description")?,
            url: row.get("url")?,
        })
    }
}

// ============================================================================
// Modules
// ============================================================================

/// Get module by ID
pub fn get_module(conn: &Connection, id: &str) -> Result<Option<ModuleRow>, TrailError> {
    let module = conn
        .query_row(
            "SELECT id, category_id, title, description FROM modules WHERE id = ?",
            params![id],
            |row| ModuleRow::from_row(row),
        )
        .optional()?;
    Ok(module)
}

/// List modules in insertion order, optionally restricted to one category
pub fn list_modules(conn: &Connection, category_id: Option<&str>) -> Result<Vec<ModuleRow>, TrailError> {
    let mut stmt = conn.prepare(
        "SELECT id, category_id, title, description FROM modules
         WHERE (?1 IS NULL OR category_id = ?1)
         ORDER BY rowid ASC",
    )?;

    let modules = stmt
        .query_map(params![category_id], |row| ModuleRow::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(modules)
}

/// Insert a module
pub fn create_module(
    conn: &Connection,
    category_id: &str,
    title: &str,
    description: &str,
) -> Result<ModuleRow, TrailError> {
    let module = ModuleRow {
        id: new_id(),
        category_id: category_id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
    };

    conn.execute(
        "INSERT INTO modules (id, category_id, title, description) VALUES (?, ?, ?, ?)",
        params![module.id, module.category_id, module.title, module.description],
    )?;

    Ok(module)
}

/// Persist title, description and category of an existing module
pub fn update_module(conn: &Connection, module: &ModuleRow) -> Result<bool, TrailError> {
    let changes = conn.execute(
        "UPDATE modules SET category_id = ?, title = ?, description = ? WHERE id = ?",
        params![module.category_id, module.title, module.description, module.id],
    )?;
    Ok(changes > 0)
}

/// Delete a module with its contents, completions and linked questions
pub fn delete_module(conn: &Connection, id: &str) -> Result<bool, TrailError> {
    conn.execute("DELETE FROM module_contents WHERE module_id = ?", params![id])?;
    completions::delete_module_completions(conn, id)?;
    challenges::delete_questions_for_module(conn, id)?;

    let changes = conn.execute("DELETE FROM modules WHERE id = ?", params![id])?;
    Ok(changes > 0)
}

// ============================================================================
// Module contents
// ============================================================================

/// Get module content by ID
pub fn get_content(conn: &Connection, id: &str) -> Result<Option<ModuleContentRow>, TrailError> {
    let content = conn
        .query_row(
            "SELECT id, module_id, content_type, description, url FROM module_contents WHERE id = ?",
            params![id],
            |row| ModuleContentRow::from_row(row),
        )
        .optional()?;
    Ok(content)
}

/// List contents ordered by description, optionally restricted to one module
pub fn list_contents(conn: &Connection, module_id: Option<&str>) -> Result<Vec<ModuleContentRow>, TrailError> {
    let mut stmt = conn.prepare(
        "SELECT id, module_id, content_type, description, url FROM module_contents
         WHERE (?1 IS NULL OR module_id = ?1)
         ORDER BY description ASC",
    )?;

    let contents = stmt
        .query_map(params![module_id], |row| ModuleContentRow::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(contents)
}

/// Insert a module content
pub fn create_content(
    conn: &Connection,
    module_id: &str,
    content_type: ContentType,
    description: &str,
    url: &str,
) -> Result<ModuleContentRow, TrailError> {
    let content = ModuleContentRow {
        id: new_id(),
        module_id: module_id.to_string(),
        content_type: content_type.as_str().to_string(),
        description: description.to_string(),
        url: url.to_string(),
    };

    conn.execute(
        "INSERT INTO module_contents (id, module_id, content_type, description, url) VALUES (?, ?, ?, ?, ?)",
        params![content.id, content.module_id, content.content_type, content.description, content.url],
    )?;

    Ok(content)
}

/// Persist module, type, description and url of an existing content
pub fn update_content(conn: &Connection, content: &ModuleContentRow) -> Result<bool, TrailError> {
    let changes = conn.execute(
        "UPDATE module_contents SET module_id = ?, content_type = ?, description = ?, url = ? WHERE id = ?",
        params![content.module_id, content.content_type, content.description, content.url, content.id],
    )?;
    Ok(changes > 0)
}

/// Delete a module content
pub fn delete_content(conn: &Connection, id: &str) -> Result<bool, TrailError> {
    let changes = conn.execute("DELETE FROM module_contents WHERE id = ?", params![id])?;
    Ok(changes > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::init_schema;
    use crate::db::{categories, trails};

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let trail = trails::create_trail(&conn, "Frontend").unwrap();
        let category = categories::create_category(&conn, &trail.id, "HTML").unwrap();
        (conn, category.id)
    }

    #[test]
    fn test_content_type_parse() {
        assert_eq!("video".parse::<ContentType>().unwrap(), ContentType::Video);
        assert!(matches!("podcast".parse::<ContentType>(), Err(TrailError::Validation(_))));
    }

    #[test]
    fn test_contents_ordered_by_description() {
        let (conn, category_id) = setup();
        let module = create_module(&conn, &category_id, "Tags", "Basic tags").unwrap();
        create_content(&conn, &module.id, ContentType::Video, "b-intro", "https://example.com/b").unwrap();
        create_content(&conn, &module.id, ContentType::Blog, "a-intro", "https://example.com/a").unwrap();

        let contents = list_contents(&conn, Some(&module.id)).unwrap();
        assert_eq!(contents[0].description, "a-intro");
        assert_eq!(contents[1].content_type, "video");
    }

    #[test]
    fn test_delete_module_removes_contents() {
        let (conn, category_id) = setup();
        let module = create_module(&conn, &category_id, "Tags", "Basic tags").unwrap();
        create_content(&conn, &module.id, ContentType::Document, "reference", "https://example.com").unwrap();

        assert!(delete_module(&conn, &module.id).unwrap());
        assert!(list_contents(&conn, None).unwrap().is_empty());
        assert!(get_module(&conn, &module.id).unwrap().is_none());
    }
}
