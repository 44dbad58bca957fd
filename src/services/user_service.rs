//! User service - registration and profile lookup

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::db::users::{self, ROLE_ADMIN, ROLE_STUDENT};
use crate::db::{completions, CompletionCounts, LearningDb, UserRow};
use crate::error::{FieldError, TrailError};

use super::events::{EventBus, LearningEvent};

/// Body of `POST /users`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserInput {
    pub full_name: String,
    pub email: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
}

/// User service for business logic
pub struct UserService {
    db: Arc<LearningDb>,
    events: Arc<EventBus>,
    admin_emails: Vec<String>,
}

impl UserService {
    /// Create a new user service; `admin_emails` register with the admin role
    pub fn new(db: Arc<LearningDb>, events: Arc<EventBus>, admin_emails: Vec<String>) -> Self {
        let admin_emails = admin_emails.iter().map(|e| e.trim().to_lowercase()).collect();
        Self { db, events, admin_emails }
    }

    /// User by ID
    pub fn get(&self, id: &str) -> Result<UserRow, TrailError> {
        self.db
            .with_conn(|conn| users::get_user(conn, id))?
            .ok_or_else(|| TrailError::NotFound(format!("User with id {} not found", id)))
    }

    /// User by ID, `None` when unknown
    pub fn find(&self, id: &str) -> Result<Option<UserRow>, TrailError> {
        self.db.with_conn(|conn| users::get_user(conn, id))
    }

    /// All users by name
    pub fn list(&self) -> Result<Vec<UserRow>, TrailError> {
        self.db.with_conn(users::list_users)
    }

    /// How many modules and challenges a user has completed
    pub fn completion_counts(&self, id: &str) -> Result<CompletionCounts, TrailError> {
        self.db.with_conn(|conn| completions::counts_for_user(conn, id))
    }

    /// Register a user with a unique email
    pub fn register(&self, input: RegisterUserInput) -> Result<UserRow, TrailError> {
        let full_name = input.full_name.trim().to_string();
        let email = input.email.trim().to_lowercase();
        let mut errors = Vec::new();

        let name_len = full_name.chars().count();
        if !(3..=100).contains(&name_len) {
            errors.push(FieldError::new("fullName", "fullName must be between 3 and 100 characters"));
        }
        if email.len() > 255 {
            errors.push(FieldError::new("email", "email must be shorter than or equal to 255 characters"));
        } else if !is_valid_email(&email) {
            errors.push(FieldError::new("email", "email must be an email"));
        }
        if NaiveDate::parse_from_str(&input.birth_date, "%Y-%m-%d").is_err() {
            errors.push(FieldError::new("birthDate", "birthDate must be a date in YYYY-MM-DD format"));
        }
        if !errors.is_empty() {
            return Err(TrailError::Validation(errors));
        }

        let role = if self.admin_emails.contains(&email) { ROLE_ADMIN } else { ROLE_STUDENT };

        let user = self.db.transaction(|conn| {
            if users::find_by_email(conn, &email)?.is_some() {
                return Err(TrailError::Conflict(format!("Email {} is already registered", email)));
            }
            users::create_user(conn, &full_name, &email, &input.birth_date, role)
        })?;

        info!(user_id = %user.id, role = %user.role, "User registered");
        self.events.emit(LearningEvent::UserRegistered { id: user.id.clone() });

        Ok(user)
    }
}

/// `local@domain.tld` with no whitespace and a dotted domain
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|label| !label.is_empty())
        }
        None => false,
    }
}
