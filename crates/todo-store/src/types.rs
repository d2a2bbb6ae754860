//! Domain types for the todo record store.
//!
//! All types serialize to/from the camelCase JSON wire form, which is also
//! the storage encoding in redb value columns.

use serde::{Deserialize, Serialize};

/// Unique identifier for a todo record (UUIDv4 string).
pub type TodoId = String;

/// A single todo record.
///
/// `id` is immutable once created. Timestamps are unix epoch milliseconds;
/// `updated_at` never decreases across updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
    pub id: TodoId,
    pub title: String,
    pub completed: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Partial update to a todo record. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TodoPatch {
    /// True if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_wire_form_is_camel_case() {
        let record = TodoRecord {
            id: "a-1".to_string(),
            title: "buy milk".to_string(),
            completed: false,
            created_at: 1000,
            updated_at: 1000,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["createdAt"], 1000);
        assert_eq!(json["updatedAt"], 1000);
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn patch_absent_fields_deserialize_as_none() {
        let patch: TodoPatch = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert_eq!(patch.title, None);
        assert_eq!(patch.completed, Some(true));
        assert!(!patch.is_empty());

        let empty: TodoPatch = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
