//! Module service - business logic for modules and their contents
//!
//! Modules belong to a category; contents are typed links attached to a
//! module. Completion toggling records or removes the caller's
//! ModuleCompletion.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::db::{categories, completions, modules, ContentType, LearningDb, ModuleContentRow, ModuleRow};
use crate::error::{FieldError, TrailError};

use super::events::{EventBus, LearningEvent};

/// Body of `POST /modules`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModuleInput {
    pub title: String,
    pub description: String,
    pub category_id: String,
}

/// Body of `PATCH /modules/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModuleInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
}

/// Body of `PATCH /modules/{id}/completion`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionInput {
    pub is_completed: bool,
}

/// Body of `POST /module-contents`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentInput {
    #[serde(rename = "type")]
    pub content_type: String,
    pub description: String,
    pub url: String,
    pub module_id: String,
}

/// Body of `PATCH /module-contents/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentInput {
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub module_id: Option<String>,
}

/// Module with its contents and the caller's completion flag
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDetail {
    pub module: ModuleRow,
    pub contents: Vec<ModuleContentRow>,
    pub completed: bool,
}

/// Module service for business logic
pub struct ModuleService {
    db: Arc<LearningDb>,
    events: Arc<EventBus>,
}

impl ModuleService {
    /// Create a new module service
    pub fn new(db: Arc<LearningDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Module Operations
    // =========================================================================

    /// Modules, optionally restricted to one category
    pub fn list(&self, category_id: Option<&str>) -> Result<Vec<ModuleRow>, TrailError> {
        self.db.with_conn(|conn| modules::list_modules(conn, category_id))
    }

    /// Module with contents and whether `user_id` completed it
    pub fn get(&self, id: &str, user_id: &str) -> Result<ModuleDetail, TrailError> {
        self.db.with_conn(|conn| {
            let module = modules::get_module(conn, id)?.ok_or_else(|| not_found(id))?;
            let contents = modules::list_contents(conn, Some(id))?;
            let completed = completions::is_module_completed(conn, user_id, id)?;
            Ok(ModuleDetail { module, contents, completed })
        })
    }

    /// Create a module in an existing category
    pub fn create(&self, input: CreateModuleInput) -> Result<ModuleRow, TrailError> {
        let mut errors = Vec::new();
        let title = required(&mut errors, "title", &input.title);
        let description = required(&mut errors, "description", &input.description);
        if !errors.is_empty() {
            return Err(TrailError::Validation(errors));
        }

        let module = self.db.transaction(|conn| {
            if categories::get_category(conn, &input.category_id)?.is_none() {
                return Err(category_not_found(&input.category_id));
            }
            modules::create_module(conn, &input.category_id, &title, &description)
        })?;

        self.events.emit(LearningEvent::ModuleCreated {
            id: module.id.clone(),
            category_id: module.category_id.clone(),
        });

        Ok(module)
    }

    /// Partially update a module
    pub fn update(&self, id: &str, input: UpdateModuleInput) -> Result<ModuleRow, TrailError> {
        let mut errors = Vec::new();
        let title = input.title.as_deref().map(|t| required(&mut errors, "title", t));
        let description = input.description.as_deref().map(|d| required(&mut errors, "description", d));
        if !errors.is_empty() {
            return Err(TrailError::Validation(errors));
        }

        let module = self.db.transaction(|conn| {
            let mut module = modules::get_module(conn, id)?.ok_or_else(|| not_found(id))?;

            if let Some(title) = title {
                module.title = title;
            }
            if let Some(description) = description {
                module.description = description;
            }
            if let Some(category_id) = input.category_id {
                if categories::get_category(conn, &category_id)?.is_none() {
                    return Err(category_not_found(&category_id));
                }
                module.category_id = category_id;
            }

            modules::update_module(conn, &module)?;
            Ok(module)
        })?;

        self.events.emit(LearningEvent::ModuleUpdated { id: module.id.clone() });
        Ok(module)
    }

    /// Delete a module with its contents, completions and linked questions
    pub fn delete(&self, id: &str) -> Result<(), TrailError> {
        let deleted = self.db.transaction(|conn| modules::delete_module(conn, id))?;
        if !deleted {
            return Err(not_found(id));
        }

        self.events.emit(LearningEvent::ModuleDeleted { id: id.to_string() });
        Ok(())
    }

    /// Mark the module completed or not completed for `user_id`
    pub fn set_completion(&self, id: &str, user_id: &str, completed: bool) -> Result<ModuleDetail, TrailError> {
        self.db.transaction(|conn| {
            if modules::get_module(conn, id)?.is_none() {
                return Err(not_found(id));
            }
            if completed {
                completions::record_module_completion(conn, user_id, id, None)?;
            } else {
                completions::remove_module_completion(conn, user_id, id)?;
            }
            Ok(())
        })?;

        debug!(module_id = %id, user_id = %user_id, completed = completed, "Module completion set");
        self.events.emit(LearningEvent::ModuleCompletionChanged {
            user_id: user_id.to_string(),
            module_id: id.to_string(),
            completed,
        });

        self.get(id, user_id)
    }

    // =========================================================================
    // Content Operations
    // =========================================================================

    /// Contents ordered by description, optionally for one module
    pub fn list_contents(&self, module_id: Option<&str>) -> Result<Vec<ModuleContentRow>, TrailError> {
        self.db.with_conn(|conn| modules::list_contents(conn, module_id))
    }

    /// Content by ID
    pub fn get_content(&self, id: &str) -> Result<ModuleContentRow, TrailError> {
        self.db
            .with_conn(|conn| modules::get_content(conn, id))?
            .ok_or_else(|| content_not_found(id))
    }

    /// Attach a content link to a module
    pub fn create_content(&self, input: CreateContentInput) -> Result<ModuleContentRow, TrailError> {
        let mut errors = Vec::new();
        let content_type = parse_type(&mut errors, &input.content_type);
        let description = required(&mut errors, "description", &input.description);
        check_url(&mut errors, &input.url);
        let content_type = match content_type {
            Some(t) if errors.is_empty() => t,
            _ => return Err(TrailError::Validation(errors)),
        };

        self.db.transaction(|conn| {
            if modules::get_module(conn, &input.module_id)?.is_none() {
                return Err(not_found(&input.module_id));
            }
            modules::create_content(conn, &input.module_id, content_type, &description, &input.url)
        })
    }

    /// Partially update a content link
    pub fn update_content(&self, id: &str, input: UpdateContentInput) -> Result<ModuleContentRow, TrailError> {
        let mut errors = Vec::new();
        let content_type = input.content_type.as_deref().map(|t| parse_type(&mut errors, t));
        let description = input.description.as_deref().map(|d| required(&mut errors, "description", d));
        if let Some(url) = &input.url {
            check_url(&mut errors, url);
        }
        if !errors.is_empty() {
            return Err(TrailError::Validation(errors));
        }

        self.db.transaction(|conn| {
            let mut content = modules::get_content(conn, id)?.ok_or_else(|| content_not_found(id))?;

            if let Some(Some(content_type)) = content_type {
                content.content_type = content_type.to_string();
            }
            if let Some(description) = description {
                content.description = description;
            }
            if let Some(url) = input.url {
                content.url = url;
            }
            if let Some(module_id) = input.module_id {
                if modules::get_module(conn, &module_id)?.is_none() {
                    return Err(not_found(&module_id));
                }
                content.module_id = module_id;
            }

            modules::update_content(conn, &content)?;
            Ok(content)
        })
    }

    /// Delete a content link
    pub fn delete_content(&self, id: &str) -> Result<(), TrailError> {
        if !self.db.with_conn(|conn| modules::delete_content(conn, id))? {
            return Err(content_not_found(id));
        }
        Ok(())
    }
}

fn not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("Module with id {} not found", id))
}

fn category_not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("Category with id {} not found", id))
}

fn content_not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("Module content with id {} not found", id))
}

fn required(errors: &mut Vec<FieldError>, field: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError::new(field, format!("{} should not be empty", field)));
    }
    value.to_string()
}

fn parse_type(errors: &mut Vec<FieldError>, value: &str) -> Option<ContentType> {
    match value.parse::<ContentType>() {
        Ok(t) => Some(t),
        Err(TrailError::Validation(mut field_errors)) => {
            errors.append(&mut field_errors);
            None
        }
        Err(e) => {
            errors.push(FieldError::new("type", e.to_string()));
            None
        }
    }
}

/// Content urls must be absolute http(s) urls
fn check_url(errors: &mut Vec<FieldError>, value: &str) {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => errors.push(FieldError::new("url", "url must be a URL address")),
    }
}
