//! TodoService — list/get/create/update/delete with validation.

use std::sync::Arc;

use tracing::{debug, warn};

use todo_store::{StoreError, TodoPatch, TodoRecord, TodoStore};

use crate::error::{ServiceError, ServiceResult};

/// Produces fresh record ids. UUIDv4 in production, scripted in tests.
pub type IdSource = Arc<dyn Fn() -> String + Send + Sync>;

/// The todo operations, orchestrating validation and the record store.
#[derive(Clone)]
pub struct TodoService {
    store: TodoStore,
    id_source: IdSource,
}

impl TodoService {
    /// Create a service with UUIDv4 id generation.
    pub fn new(store: TodoStore) -> Self {
        Self {
            store,
            id_source: Arc::new(|| uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Create a service with a custom id source.
    pub fn with_id_source(store: TodoStore, id_source: IdSource) -> Self {
        Self { store, id_source }
    }

    /// List all records, ordered by creation time ascending (id as tie-break).
    pub fn list(&self) -> ServiceResult<Vec<TodoRecord>> {
        let mut records = self.store.list_todos()?;
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> ServiceResult<TodoRecord> {
        self.store
            .get_todo(id)?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    /// Create a record with the given title.
    ///
    /// A colliding generated id is regenerated once; a second collision
    /// surfaces as a store error.
    pub fn create(&self, title: &str) -> ServiceResult<TodoRecord> {
        let title = validate_title(title)?;
        let now = epoch_millis();
        let mut record = TodoRecord {
            id: (self.id_source)(),
            title,
            completed: false,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_todo(&record) {
            Ok(()) => {}
            Err(StoreError::Conflict(id)) => {
                warn!(%id, "generated id collided, retrying once");
                record.id = (self.id_source)();
                self.store.insert_todo(&record)?;
            }
            Err(e) => return Err(e.into()),
        }

        debug!(id = %record.id, "todo created");
        Ok(record)
    }

    /// Apply a partial update. Absent patch fields are left unchanged;
    /// `updated_at` is always refreshed.
    pub fn update(&self, id: &str, patch: &TodoPatch) -> ServiceResult<TodoRecord> {
        let mut record = self.get(id)?;

        if let Some(title) = &patch.title {
            record.title = validate_title(title)?;
        }
        if let Some(completed) = patch.completed {
            record.completed = completed;
        }
        // Monotonic even when the wall clock hasn't advanced a millisecond.
        record.updated_at = epoch_millis().max(record.updated_at + 1);

        self.store.put_todo(&record)?;
        debug!(%id, "todo updated");
        Ok(record)
    }

    /// Delete a record by id.
    pub fn delete(&self, id: &str) -> ServiceResult<()> {
        if !self.store.delete_todo(id)? {
            return Err(ServiceError::NotFound(id.to_string()));
        }
        debug!(%id, "todo deleted");
        Ok(())
    }
}

/// Reject empty/whitespace titles, returning the title otherwise.
fn validate_title(title: &str) -> ServiceResult<String> {
    if title.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "title must not be empty".to_string(),
        ));
    }
    Ok(title.to_string())
}

fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_service() -> TodoService {
        TodoService::new(TodoStore::open_in_memory().unwrap())
    }

    /// An id source that replays a fixed script, then falls back to UUIDs.
    fn scripted_ids(script: &[&str]) -> IdSource {
        let script: Vec<String> = script.iter().map(|s| s.to_string()).collect();
        let cursor = AtomicUsize::new(0);
        Arc::new(move || {
            let i = cursor.fetch_add(1, Ordering::Relaxed);
            script
                .get(i)
                .cloned()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
        })
    }

    // ── Create ─────────────────────────────────────────────────────

    #[test]
    fn create_then_get_returns_record() {
        let service = test_service();
        let created = service.create("write the report").unwrap();

        let fetched = service.get(&created.id).unwrap();
        assert_eq!(fetched.title, "write the report");
        assert!(!fetched.completed);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[test]
    fn create_rejects_empty_title() {
        let service = test_service();
        assert!(matches!(
            service.create(""),
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            service.create("   \t"),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[test]
    fn create_generates_distinct_ids() {
        let service = test_service();
        let a = service.create("one").unwrap();
        let b = service.create("two").unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn create_retries_id_collision_once() {
        let store = TodoStore::open_in_memory().unwrap();
        let service =
            TodoService::with_id_source(store, scripted_ids(&["dup", "dup", "fresh"]));

        let first = service.create("first").unwrap();
        assert_eq!(first.id, "dup");

        // Second create draws "dup" again, collides, retries with "fresh".
        let second = service.create("second").unwrap();
        assert_eq!(second.id, "fresh");
    }

    #[test]
    fn create_surfaces_store_error_after_second_collision() {
        let store = TodoStore::open_in_memory().unwrap();
        let service =
            TodoService::with_id_source(store, scripted_ids(&["dup", "dup", "dup"]));

        service.create("first").unwrap();
        let err = service.create("second").unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Conflict(_))));
    }

    // ── Get / delete ───────────────────────────────────────────────

    #[test]
    fn get_missing_is_not_found() {
        let service = test_service();
        assert!(matches!(
            service.get("nope"),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let service = test_service();
        let created = service.create("short-lived").unwrap();

        service.delete(&created.id).unwrap();
        assert!(matches!(
            service.get(&created.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn delete_missing_is_not_found() {
        let service = test_service();
        assert!(matches!(
            service.delete("nope"),
            Err(ServiceError::NotFound(_))
        ));
    }

    // ── Update ─────────────────────────────────────────────────────

    #[test]
    fn update_merges_patch_fields() {
        let service = test_service();
        let created = service.create("draft").unwrap();

        let patch = TodoPatch {
            title: Some("final".to_string()),
            completed: Some(true),
        };
        let updated = service.update(&created.id, &patch).unwrap();

        assert_eq!(updated.title, "final");
        assert!(updated.completed);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[test]
    fn update_empty_patch_refreshes_only_updated_at() {
        let service = test_service();
        let created = service.create("unchanged").unwrap();

        let updated = service.update(&created.id, &TodoPatch::default()).unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.completed, created.completed);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[test]
    fn update_rejects_emptying_title() {
        let service = test_service();
        let created = service.create("keep me").unwrap();

        let patch = TodoPatch {
            title: Some("  ".to_string()),
            completed: None,
        };
        assert!(matches!(
            service.update(&created.id, &patch),
            Err(ServiceError::InvalidInput(_))
        ));

        // Record untouched.
        assert_eq!(service.get(&created.id).unwrap().title, "keep me");
    }

    #[test]
    fn update_missing_is_not_found() {
        let service = test_service();
        let patch = TodoPatch {
            title: Some("anything".to_string()),
            completed: None,
        };
        assert!(matches!(
            service.update("nope", &patch),
            Err(ServiceError::NotFound(_))
        ));
    }

    // ── List ───────────────────────────────────────────────────────

    #[test]
    fn list_orders_by_creation_time() {
        let store = TodoStore::open_in_memory().unwrap();
        // Ids chosen so key order disagrees with creation order.
        let service =
            TodoService::with_id_source(store, scripted_ids(&["z", "m", "a"]));

        // Space creates out so creation timestamps are distinct.
        service.create("first").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        service.create("second").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        service.create("third").unwrap();

        let all = service.list().unwrap();
        let titles: Vec<&str> = all.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["first", "second", "third"]);
    }

    #[test]
    fn list_empty_store() {
        let service = test_service();
        assert!(service.list().unwrap().is_empty());
    }
}
