//! redb table definitions for the todo record store.
//!
//! Values are JSON-serialized domain types in `&[u8]` columns.

use redb::TableDefinition;

/// Todo records keyed by `{id}` (UUIDv4 string).
pub const TODOS: TableDefinition<&str, &[u8]> = TableDefinition::new("todos");
