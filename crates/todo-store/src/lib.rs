//! todo-store — embedded record store for the todo API.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for todo records.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value column, keyed by
//! record id. Create and update semantics are distinct: `insert_todo` is a
//! conditional put that fails with [`StoreError::Conflict`] when the key
//! already exists, while `put_todo` overwrites unconditionally
//! (last-write-wins).
//!
//! The `TodoStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use store::TodoStore;
pub use types::*;
