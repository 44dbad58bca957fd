//! Category reordering
//!
//! A reorder request claims to be the complete new ordering of one trail's
//! categories. It is validated in full before the first write, so a rejected
//! request leaves every `order` untouched.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{categories, trails, CategoryRow};
use crate::error::TrailError;

/// One `{id, order}` pair of a reorder request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOrder {
    pub id: String,
    pub order: i64,
}

impl CategoryOrder {
    pub fn new(id: impl Into<String>, order: i64) -> Self {
        Self { id: id.into(), order }
    }
}

/// Storage operations the reorder protocol needs
pub trait CategoryOrderStore {
    fn trail_exists(&self, trail_id: &str) -> Result<bool, TrailError>;

    fn category_count(&self, trail_id: &str) -> Result<usize, TrailError>;

    fn find_category(&self, id: &str) -> Result<Option<CategoryRow>, TrailError>;

    fn save_order(&self, id: &str, order: i64) -> Result<(), TrailError>;
}

impl CategoryOrderStore for Connection {
    fn trail_exists(&self, trail_id: &str) -> Result<bool, TrailError> {
        trails::trail_exists(self, trail_id)
    }

    fn category_count(&self, trail_id: &str) -> Result<usize, TrailError> {
        categories::count_for_trail(self, trail_id)
    }

    fn find_category(&self, id: &str) -> Result<Option<CategoryRow>, TrailError> {
        categories::get_category(self, id)
    }

    fn save_order(&self, id: &str, order: i64) -> Result<(), TrailError> {
        if !categories::set_order(self, id, order)? {
            return Err(TrailError::NotFound(format!("Category with id {} not found", id)));
        }
        Ok(())
    }
}

/// Validates and commits full reorderings of a trail's categories
pub struct ReorderValidator<'a, S: CategoryOrderStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CategoryOrderStore + ?Sized> ReorderValidator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Check `items` against the trail's current categories.
    ///
    /// Returns the loaded categories in the supplied order.
    pub fn validate(&self, trail_id: &str, items: &[CategoryOrder]) -> Result<Vec<CategoryRow>, TrailError> {
        if !self.store.trail_exists(trail_id)? {
            return Err(TrailError::NotFound(format!("Trail with id {} not found", trail_id)));
        }

        let count = self.store.category_count(trail_id)?;
        if items.len() != count {
            return Err(TrailError::InvalidInput(format!(
                "Expected {} categories for trail {}, got {}",
                count,
                trail_id,
                items.len()
            )));
        }

        let mut found = Vec::with_capacity(items.len());
        for item in items {
            let category = self
                .store
                .find_category(&item.id)?
                .ok_or_else(|| TrailError::NotFound(format!("Category with id {} not found", item.id)))?;
            found.push(category);
        }

        if let Some(stray) = found.iter().find(|c| c.trail_id != trail_id) {
            return Err(TrailError::InvalidInput(format!(
                "Category {} does not belong to trail {}",
                stray.id, trail_id
            )));
        }

        let mut seen = HashSet::with_capacity(items.len());
        if let Some(dup) = items.iter().find(|item| !seen.insert(item.id.as_str())) {
            return Err(TrailError::InvalidInput(format!(
                "Category {} appears more than once",
                dup.id
            )));
        }

        Ok(found)
    }

    /// Validate, then write every supplied order.
    ///
    /// Returns the updated categories in the supplied order.
    pub fn apply(&self, trail_id: &str, items: &[CategoryOrder]) -> Result<Vec<CategoryRow>, TrailError> {
        let found = self.validate(trail_id, items)?;

        let mut updated = Vec::with_capacity(found.len());
        for (mut category, item) in found.into_iter().zip(items) {
            self.store.save_order(&category.id, item.order)?;
            category.order_index = item.order;
            updated.push(category);
        }

        debug!(trail_id = %trail_id, count = updated.len(), "Committed category order");
        Ok(updated)
    }
}

/// Pairs `{id, index + 1}` for categories already sorted in their intended order
pub fn contiguous_order(categories: &[CategoryRow]) -> Vec<CategoryOrder> {
    categories
        .iter()
        .enumerate()
        .map(|(index, c)| CategoryOrder::new(c.id.clone(), index as i64 + 1))
        .collect()
}

/// Renumber a trail's remaining categories to 1..N, keeping their relative order
pub fn renumber(conn: &Connection, trail_id: &str) -> Result<Vec<CategoryRow>, TrailError> {
    let remaining = categories::list_categories(conn, Some(trail_id))?;
    ReorderValidator::new(conn).apply(trail_id, &contiguous_order(&remaining))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Store that records every write
    struct FakeStore {
        trails: Vec<String>,
        categories: RefCell<HashMap<String, CategoryRow>>,
        writes: RefCell<Vec<(String, i64)>>,
    }

    impl FakeStore {
        fn new() -> Self {
            let mut categories = HashMap::new();
            for (id, trail, order) in [("a", "t1", 1), ("b", "t1", 2), ("c", "t1", 3), ("x", "t2", 1)] {
                categories.insert(
                    id.to_string(),
                    CategoryRow {
                        id: id.into(),
                        trail_id: trail.into(),
                        name: id.to_uppercase(),
                        order_index: order,
                    },
                );
            }
            Self {
                trails: vec!["t1".into(), "t2".into()],
                categories: RefCell::new(categories),
                writes: RefCell::new(vec![]),
            }
        }

        fn order_of(&self, id: &str) -> i64 {
            self.categories.borrow()[id].order_index
        }
    }

    impl CategoryOrderStore for FakeStore {
        fn trail_exists(&self, trail_id: &str) -> Result<bool, TrailError> {
            Ok(self.trails.iter().any(|t| t == trail_id))
        }

        fn category_count(&self, trail_id: &str) -> Result<usize, TrailError> {
            Ok(self.categories.borrow().values().filter(|c| c.trail_id == trail_id).count())
        }

        fn find_category(&self, id: &str) -> Result<Option<CategoryRow>, TrailError> {
            Ok(self.categories.borrow().get(id).cloned())
        }

        fn save_order(&self, id: &str, order: i64) -> Result<(), TrailError> {
            self.writes.borrow_mut().push((id.to_string(), order));
            if let Some(c) = self.categories.borrow_mut().get_mut(id) {
                c.order_index = order;
            }
            Ok(())
        }
    }

    fn items(pairs: &[(&str, i64)]) -> Vec<CategoryOrder> {
        pairs.iter().map(|(id, order)| CategoryOrder::new(*id, *order)).collect()
    }

    #[test]
    fn test_apply_permutation() {
        let store = FakeStore::new();
        let updated = ReorderValidator::new(&store)
            .apply("t1", &items(&[("c", 1), ("a", 2), ("b", 3)]))
            .unwrap();

        let ids: Vec<&str> = updated.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(store.order_of("c"), 1);
        assert_eq!(store.order_of("a"), 2);
        assert_eq!(store.order_of("b"), 3);
    }

    #[test]
    fn test_output_keeps_supplied_order() {
        let store = FakeStore::new();
        let updated = ReorderValidator::new(&store)
            .apply("t1", &items(&[("b", 3), ("a", 1), ("c", 2)]))
            .unwrap();

        let pairs: Vec<(&str, i64)> = updated.iter().map(|c| (c.id.as_str(), c.order_index)).collect();
        assert_eq!(pairs, vec![("b", 3), ("a", 1), ("c", 2)]);
    }

    #[test]
    fn test_unknown_trail() {
        let store = FakeStore::new();
        let err = ReorderValidator::new(&store).apply("nope", &[]).unwrap_err();
        assert!(matches!(err, TrailError::NotFound(_)));
    }

    #[test]
    fn test_count_mismatch_writes_nothing() {
        let store = FakeStore::new();
        let err = ReorderValidator::new(&store)
            .apply("t1", &items(&[("a", 2), ("b", 1)]))
            .unwrap_err();

        assert!(matches!(err, TrailError::InvalidInput(_)));
        assert!(store.writes.borrow().is_empty());
        assert_eq!(store.order_of("a"), 1);
        assert_eq!(store.order_of("b"), 2);
    }

    #[test]
    fn test_unknown_category() {
        let store = FakeStore::new();
        let err = ReorderValidator::new(&store)
            .apply("t1", &items(&[("a", 1), ("b", 2), ("ghost", 3)]))
            .unwrap_err();

        match err {
            TrailError::NotFound(msg) => assert!(msg.contains("ghost")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.writes.borrow().is_empty());
    }

    #[test]
    fn test_category_from_other_trail() {
        let store = FakeStore::new();
        let err = ReorderValidator::new(&store)
            .apply("t1", &items(&[("a", 1), ("b", 2), ("x", 3)]))
            .unwrap_err();

        assert!(matches!(err, TrailError::InvalidInput(_)));
        assert!(store.writes.borrow().is_empty());
        assert_eq!(store.order_of("x"), 1);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let store = FakeStore::new();
        let err = ReorderValidator::new(&store)
            .apply("t1", &items(&[("a", 1), ("a", 2), ("b", 3)]))
            .unwrap_err();

        assert!(matches!(err, TrailError::InvalidInput(_)));
        assert!(store.writes.borrow().is_empty());
    }

    #[test]
    fn test_contiguous_order() {
        let store = FakeStore::new();
        let rows = vec![store.find_category("c").unwrap().unwrap(), store.find_category("a").unwrap().unwrap()];
        assert_eq!(contiguous_order(&rows), items(&[("c", 1), ("a", 2)]));
    }
}
