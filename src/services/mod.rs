//! Service layer for learning-trails
//!
//! Services encapsulate business logic between HTTP handlers and repositories.
//! Each service wraps database operations with:
//! - Input validation
//! - Cross-entity orchestration (cascades, renumbering)
//! - Event emission for audit logging
//! - Transaction boundaries
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic, ProgressResolver, ReorderValidator)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod progress;
pub mod reorder;
pub mod trail_service;
pub mod category_service;
pub mod module_service;
pub mod challenge_service;
pub mod user_service;
pub mod completion_service;

// Re-exports
pub use response::*;
pub use events::{EventBus, LearningEvent, EventListener};
pub use progress::{ProgressResolver, ProgressSource, TrailProgress};
pub use reorder::{CategoryOrder, CategoryOrderStore, ReorderValidator};
pub use trail_service::TrailService;
pub use category_service::CategoryService;
pub use module_service::ModuleService;
pub use challenge_service::ChallengeService;
pub use user_service::UserService;
pub use completion_service::CompletionService;

use std::sync::Arc;

use crate::config::Config;
use crate::db::LearningDb;

/// Service container for dependency injection
///
/// Holds all services with shared database connection.
/// Pass this to HttpServer for handler access.
pub struct Services {
    pub db: Arc<LearningDb>,
    pub trails: Arc<TrailService>,
    pub categories: Arc<CategoryService>,
    pub modules: Arc<ModuleService>,
    pub challenges: Arc<ChallengeService>,
    pub users: Arc<UserService>,
    pub completions: Arc<CompletionService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services with shared database
    pub fn new(db: Arc<LearningDb>, config: &Config) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            trails: Arc::new(TrailService::new(db.clone(), events.clone())),
            categories: Arc::new(CategoryService::new(db.clone(), events.clone())),
            modules: Arc::new(ModuleService::new(db.clone(), events.clone())),
            challenges: Arc::new(ChallengeService::new(db.clone(), events.clone(), config.pass_percentage)),
            users: Arc::new(UserService::new(db.clone(), events.clone(), config.admin_emails.clone())),
            completions: Arc::new(CompletionService::new(db.clone())),
            db,
            events,
        }
    }
}
