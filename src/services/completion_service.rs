//! Completion service - direct creation of completion records
//!
//! Progress normally changes through module toggling and challenge
//! responses; these endpoints let an administrator record completions
//! directly (imports, corrections).

use std::sync::Arc;

use chrono::DateTime;
use serde::Deserialize;

use crate::db::{challenges, completions, modules, users, CompletionRow, LearningDb};
use crate::error::TrailError;

/// Body of `POST /module-completions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCompletionInput {
    pub user_id: String,
    pub module_id: String,
    pub completed_at: Option<String>,
}

/// Body of `POST /challenge-completions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeCompletionInput {
    pub user_id: String,
    pub challenge_id: String,
    pub completed_at: Option<String>,
}

/// Completion service for business logic
pub struct CompletionService {
    db: Arc<LearningDb>,
}

impl CompletionService {
    /// Create a new completion service
    pub fn new(db: Arc<LearningDb>) -> Self {
        Self { db }
    }

    /// Record that a user finished a module
    pub fn record_module(&self, input: ModuleCompletionInput) -> Result<CompletionRow, TrailError> {
        let completed_at = normalize_timestamp(input.completed_at.as_deref())?;

        self.db.transaction(|conn| {
            if users::get_user(conn, &input.user_id)?.is_none() {
                return Err(user_not_found(&input.user_id));
            }
            if modules::get_module(conn, &input.module_id)?.is_none() {
                return Err(TrailError::NotFound(format!("Module with id {} not found", input.module_id)));
            }
            completions::record_module_completion(conn, &input.user_id, &input.module_id, completed_at.as_deref())
        })
    }

    /// Record that a user passed a challenge
    pub fn record_challenge(&self, input: ChallengeCompletionInput) -> Result<CompletionRow, TrailError> {
        let completed_at = normalize_timestamp(input.completed_at.as_deref())?;

        self.db.transaction(|conn| {
            if users::get_user(conn, &input.user_id)?.is_none() {
                return Err(user_not_found(&input.user_id));
            }
            if challenges::get_challenge(conn, &input.challenge_id)?.is_none() {
                return Err(TrailError::NotFound(format!(
                    "Challenge with id {} not found",
                    input.challenge_id
                )));
            }
            completions::record_challenge_completion(
                conn,
                &input.user_id,
                &input.challenge_id,
                completed_at.as_deref(),
            )
        })
    }
}

fn user_not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("User with id {} not found", id))
}

/// Accept RFC 3339 timestamps only, stored in their canonical form
fn normalize_timestamp(value: Option<&str>) -> Result<Option<String>, TrailError> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(v)
                .map(|t| t.to_rfc3339())
                .map_err(|_| TrailError::field("completedAt", "completedAt must be an RFC 3339 timestamp"))
        })
        .transpose()
}
