//! Category service - business logic for category operations
//!
//! Keeps every trail's category orders contiguous: creation appends,
//! deletion and moves renumber the trail that lost a category, and explicit
//! reorders go through [`ReorderValidator`] inside one transaction.

use std::sync::Arc;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;

use crate::db::{categories, challenges, modules, trails, CategoryRow, LearningDb, ModuleRow};
use crate::error::TrailError;

use super::events::{EventBus, LearningEvent};
use super::reorder::{self, CategoryOrder, ReorderValidator};

/// Body of `POST /categories`; a client-supplied order is ignored
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryInput {
    pub name: String,
    pub trail_id: String,
}

/// Body of `PATCH /categories/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub trail_id: Option<String>,
}

/// Body of `POST /categories/reorder`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderInput {
    pub trail_id: String,
    pub categories: Vec<CategoryOrder>,
}

/// Category with its modules and challenge id
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDetail {
    pub category: CategoryRow,
    pub modules: Vec<ModuleRow>,
    pub challenge_id: Option<String>,
}

/// Category service for business logic
pub struct CategoryService {
    db: Arc<LearningDb>,
    events: Arc<EventBus>,
}

impl CategoryService {
    /// Create a new category service
    pub fn new(db: Arc<LearningDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Categories ascending by order, optionally for one trail
    pub fn list(&self, trail_id: Option<&str>) -> Result<Vec<CategoryDetail>, TrailError> {
        self.db.with_conn(|conn| {
            categories::list_categories(conn, trail_id)?
                .into_iter()
                .map(|c| load_detail(conn, c))
                .collect()
        })
    }

    /// Category by ID with modules and challenge
    pub fn get(&self, id: &str) -> Result<CategoryDetail, TrailError> {
        self.db.with_conn(|conn| {
            let category = categories::get_category(conn, id)?.ok_or_else(|| not_found(id))?;
            load_detail(conn, category)
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Append a category to the end of its trail
    pub fn create(&self, input: CreateCategoryInput) -> Result<CategoryRow, TrailError> {
        let name = validate_name(&input.name)?;

        let category = self.db.transaction(|conn| {
            if !trails::trail_exists(conn, &input.trail_id)? {
                return Err(trail_not_found(&input.trail_id));
            }
            categories::create_category(conn, &input.trail_id, &name)
        })?;

        self.events.emit(LearningEvent::CategoryCreated {
            id: category.id.clone(),
            trail_id: category.trail_id.clone(),
            order: category.order_index,
        });

        Ok(category)
    }

    /// Rename a category and/or move it to another trail.
    ///
    /// A moved category is appended to its new trail and the trail it left
    /// is renumbered.
    pub fn update(&self, id: &str, input: UpdateCategoryInput) -> Result<CategoryRow, TrailError> {
        let name = input.name.as_deref().map(validate_name).transpose()?;

        let (category, moved_from) = self.db.transaction(|conn| {
            let mut category = categories::get_category(conn, id)?.ok_or_else(|| not_found(id))?;
            let mut moved_from = None;

            if let Some(name) = name {
                category.name = name;
            }

            if let Some(target) = input.trail_id.as_deref().filter(|t| *t != category.trail_id) {
                if !trails::trail_exists(conn, target)? {
                    return Err(trail_not_found(target));
                }
                moved_from = Some(std::mem::replace(&mut category.trail_id, target.to_string()));
                category.order_index = categories::count_for_trail(conn, target)? as i64 + 1;
            }

            categories::update_category(conn, &category)?;

            if let Some(old_trail) = &moved_from {
                reorder::renumber(conn, old_trail)?;
            }

            Ok((category, moved_from))
        })?;

        match moved_from {
            Some(from_trail_id) => self.events.emit(LearningEvent::CategoryMoved {
                id: category.id.clone(),
                from_trail_id,
                to_trail_id: category.trail_id.clone(),
            }),
            None => self.events.emit(LearningEvent::CategoryUpdated { id: category.id.clone() }),
        }

        Ok(category)
    }

    /// Delete a category (with modules and challenge) and renumber its trail
    pub fn delete(&self, id: &str) -> Result<(), TrailError> {
        let trail_id = self.db.transaction(|conn| {
            let category = categories::get_category(conn, id)?.ok_or_else(|| not_found(id))?;
            categories::delete_category(conn, id)?;
            reorder::renumber(conn, &category.trail_id)?;
            Ok(category.trail_id)
        })?;

        self.events.emit(LearningEvent::CategoryDeleted {
            id: id.to_string(),
            trail_id,
        });
        Ok(())
    }

    /// Replace the full ordering of a trail's categories
    pub fn reorder(&self, input: ReorderInput) -> Result<Vec<CategoryRow>, TrailError> {
        let updated = self
            .db
            .transaction(|conn| ReorderValidator::new(conn).apply(&input.trail_id, &input.categories))?;

        info!(trail_id = %input.trail_id, count = updated.len(), "Reordered categories");
        self.events.emit(LearningEvent::CategoriesReordered {
            trail_id: input.trail_id,
            count: updated.len(),
        });

        Ok(updated)
    }
}

fn load_detail(conn: &Connection, category: CategoryRow) -> Result<CategoryDetail, TrailError> {
    let modules = modules::list_modules(conn, Some(&category.id))?;
    let challenge_id = challenges::challenge_for_category(conn, &category.id)?.map(|c| c.id);
    Ok(CategoryDetail {
        category,
        modules,
        challenge_id,
    })
}

fn not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("Category with id {} not found", id))
}

fn trail_not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("Trail with id {} not found", id))
}

fn validate_name(name: &str) -> Result<String, TrailError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TrailError::field("name", "name should not be empty"));
    }
    Ok(name.to_string())
}
