//! Learning Trails - learning-platform backend with progress gating
//!
//! Trails are ordered sequences of categories; each category holds modules
//! and at most one challenge. A learner's progress through a trail is
//! resolved per category, and a category stays blocked until every earlier
//! challenge in the trail has been passed.
//!
//! ## Layout
//!
//! - `db` - SQLite repositories (one module per table group)
//! - `services` - Business logic, [`ProgressResolver`] and [`ReorderValidator`]
//! - `views` - camelCase API types exported to TypeScript
//! - `http` - hyper server and routing
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/learning-trails/
//! ├── learning.db      # SQLite database (WAL mode)
//! └── config.toml      # Configuration
//! ```

pub mod config;
pub mod error;
pub mod db;
pub mod services;
pub mod views;
pub mod auth;
pub mod http;

pub use config::Config;
pub use db::LearningDb;
pub use error::{FieldError, TrailError};
pub use http::HttpServer;
pub use services::{CategoryOrder, ProgressResolver, ReorderValidator, Services};
