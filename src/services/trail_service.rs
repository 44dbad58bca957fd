//! Trail service - business logic for trail operations
//!
//! Wraps the trail repository with name validation, event emission and
//! progress resolution for a user.

use std::sync::Arc;

use serde::Deserialize;

use crate::db::{trails, LearningDb, TrailOutline, TrailRow};
use crate::error::TrailError;

use super::events::{EventBus, LearningEvent};
use super::progress::{ProgressResolver, TrailProgress};

/// Body of `POST /trails`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrailInput {
    pub name: String,
}

/// Body of `PATCH /trails/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrailInput {
    pub name: Option<String>,
}

/// Trail service for business logic
pub struct TrailService {
    db: Arc<LearningDb>,
    events: Arc<EventBus>,
}

impl TrailService {
    /// Create a new trail service
    pub fn new(db: Arc<LearningDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// All trails by name, each with its ordered categories
    pub fn list(&self) -> Result<Vec<TrailOutline>, TrailError> {
        self.db.with_conn(|conn| {
            let mut outlines = Vec::new();
            for trail in trails::list_trails(conn)? {
                if let Some(outline) = trails::get_trail_outline(conn, &trail.id)? {
                    outlines.push(outline);
                }
            }
            Ok(outlines)
        })
    }

    /// Trail with ordered categories, modules and challenge ids
    pub fn get(&self, id: &str) -> Result<TrailOutline, TrailError> {
        self.db
            .with_conn(|conn| trails::get_trail_outline(conn, id))?
            .ok_or_else(|| not_found(id))
    }

    /// Progress of `user_id` through the trail
    pub fn progress(&self, trail_id: &str, user_id: &str) -> Result<TrailProgress, TrailError> {
        self.db
            .with_conn(|conn| ProgressResolver::new(conn).resolve(trail_id, user_id))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a trail with a unique name
    pub fn create(&self, input: CreateTrailInput) -> Result<TrailRow, TrailError> {
        let name = validate_name(&input.name)?;

        let trail = self.db.transaction(|conn| {
            if trails::name_taken(conn, &name, None)? {
                return Err(TrailError::Conflict(format!("A trail named '{}' already exists", name)));
            }
            trails::create_trail(conn, &name)
        })?;

        self.events.emit(LearningEvent::TrailCreated {
            id: trail.id.clone(),
            name: trail.name.clone(),
        });

        Ok(trail)
    }

    /// Rename a trail
    pub fn update(&self, id: &str, input: UpdateTrailInput) -> Result<TrailRow, TrailError> {
        let name = input.name.as_deref().map(validate_name).transpose()?;

        let trail = self.db.transaction(|conn| {
            let mut trail = trails::get_trail(conn, id)?.ok_or_else(|| not_found(id))?;

            if let Some(name) = name {
                if trails::name_taken(conn, &name, Some(id))? {
                    return Err(TrailError::Conflict(format!("A trail named '{}' already exists", name)));
                }
                trails::rename_trail(conn, id, &name)?;
                trail.name = name;
            }

            Ok(trail)
        })?;

        self.events.emit(LearningEvent::TrailUpdated { id: trail.id.clone() });
        Ok(trail)
    }

    /// Delete a trail with all of its categories
    pub fn delete(&self, id: &str) -> Result<(), TrailError> {
        let deleted = self.db.transaction(|conn| trails::delete_trail(conn, id))?;
        if !deleted {
            return Err(not_found(id));
        }

        self.events.emit(LearningEvent::TrailDeleted { id: id.to_string() });
        Ok(())
    }
}

fn not_found(id: &str) -> TrailError {
    TrailError::NotFound(format!("Trail with id {} not found", id))
}

fn validate_name(name: &str) -> Result<String, TrailError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TrailError::field("name", "name should not be empty"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TrailService {
        let db = Arc::new(LearningDb::open_in_memory().unwrap());
        TrailService::new(db, Arc::new(EventBus::new()))
    }

    fn input(name: &str) -> CreateTrailInput {
        CreateTrailInput { name: name.to_string() }
    }

    #[test]
    fn test_create_trims_and_rejects_duplicates() {
        let service = service();
        let trail = service.create(input("  Frontend ")).unwrap();
        assert_eq!(trail.name, "Frontend");

        let err = service.create(input("Frontend")).unwrap_err();
        assert!(matches!(err, TrailError::Conflict(_)));
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let err = service().create(input("   ")).unwrap_err();
        assert!(matches!(err, TrailError::Validation(_)));
    }

    #[test]
    fn test_list_sorted_by_name() {
        let service = service();
        service.create(input("Frontend")).unwrap();
        service.create(input("Backend")).unwrap();

        let names: Vec<String> = service.list().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Backend", "Frontend"]);
    }

    #[test]
    fn test_update_conflict_and_rename() {
        let service = service();
        let frontend = service.create(input("Frontend")).unwrap();
        service.create(input("Backend")).unwrap();

        let err = service
            .update(&frontend.id, UpdateTrailInput { name: Some("Backend".into()) })
            .unwrap_err();
        assert!(matches!(err, TrailError::Conflict(_)));

        // Keeping its own name is not a conflict
        let same = service
            .update(&frontend.id, UpdateTrailInput { name: Some("Frontend".into()) })
            .unwrap();
        assert_eq!(same.name, "Frontend");

        let renamed = service
            .update(&frontend.id, UpdateTrailInput { name: Some("Web".into()) })
            .unwrap();
        assert_eq!(service.get(&renamed.id).unwrap().name, "Web");
    }

    #[test]
    fn test_delete_missing_trail() {
        let err = service().delete("missing").unwrap_err();
        assert!(matches!(err, TrailError::NotFound(_)));
    }
}
