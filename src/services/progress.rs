//! Trail progress resolution
//!
//! Walks a trail's categories in ascending order and annotates every module
//! and challenge with the user's completion state. A category is blocked
//! while any earlier category in the trail has a challenge the user has not
//! passed yet.

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::db::{completions, trails, TrailOutline};
use crate::error::TrailError;

/// Read access needed to resolve progress
pub trait ProgressSource {
    /// Trail with categories ascending by order, each with modules and challenge
    fn trail_outline(&self, trail_id: &str) -> Result<Option<TrailOutline>, TrailError>;

    fn is_module_completed(&self, user_id: &str, module_id: &str) -> Result<bool, TrailError>;

    fn is_challenge_completed(&self, user_id: &str, challenge_id: &str) -> Result<bool, TrailError>;
}

impl ProgressSource for Connection {
    fn trail_outline(&self, trail_id: &str) -> Result<Option<TrailOutline>, TrailError> {
        trails::get_trail_outline(self, trail_id)
    }

    fn is_module_completed(&self, user_id: &str, module_id: &str) -> Result<bool, TrailError> {
        completions::is_module_completed(self, user_id, module_id)
    }

    fn is_challenge_completed(&self, user_id: &str, challenge_id: &str) -> Result<bool, TrailError> {
        completions::is_challenge_completed(self, user_id, challenge_id)
    }
}

/// Progress snapshot of one trail for one user
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrailProgress {
    pub trail: TrailProgressBody,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrailProgressBody {
    pub id: String,
    pub name: String,
    pub categories: Vec<CategoryProgress>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryProgress {
    pub id: String,
    pub name: String,
    pub order: i64,
    pub modules: Vec<ModuleProgress>,
    pub challenge: Option<ChallengeStatus>,
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModuleProgress {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChallengeStatus {
    pub id: String,
    pub completed: bool,
}

/// Computes per-category completion and blocking for a user
pub struct ProgressResolver<'a, S: ProgressSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: ProgressSource + ?Sized> ProgressResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Resolve the progress of `user_id` on `trail_id`
    pub fn resolve(&self, trail_id: &str, user_id: &str) -> Result<TrailProgress, TrailError> {
        let outline = self
            .source
            .trail_outline(trail_id)?
            .ok_or_else(|| TrailError::NotFound(format!("Trail with id {} not found", trail_id)))?;

        let mut has_incomplete_challenge = false;
        let mut categories = Vec::with_capacity(outline.categories.len());

        for category in outline.categories {
            let mut modules = Vec::with_capacity(category.modules.len());
            for module in category.modules {
                let completed = self.source.is_module_completed(user_id, &module.id)?;
                modules.push(ModuleProgress {
                    id: module.id,
                    title: module.title,
                    description: module.description,
                    completed,
                });
            }

            let challenge = match category.challenge_id {
                Some(id) => {
                    let completed = self.source.is_challenge_completed(user_id, &id)?;
                    Some(ChallengeStatus { id, completed })
                }
                None => None,
            };

            let blocked = has_incomplete_challenge;
            if matches!(&challenge, Some(c) if !c.completed) {
                has_incomplete_challenge = true;
            }

            categories.push(CategoryProgress {
                id: category.id,
                name: category.name,
                order: category.order_index,
                modules,
                challenge,
                blocked,
            });
        }

        debug!(
            trail_id = %trail_id,
            user_id = %user_id,
            categories = categories.len(),
            "Resolved trail progress"
        );

        Ok(TrailProgress {
            trail: TrailProgressBody {
                id: outline.id,
                name: outline.name,
                categories,
            },
        })
    }
}
