//! Storage abstractions for service layer
//!
//! - `store`: the `UserStore` contract (plus an in-memory mock)
//! - `redb_store`: the embedded, file-backed engine
//! - `codec`: value encoding shared by engines
//! - `context`: per-operation context threaded through every call

pub mod codec;
pub mod context;
pub mod error;
pub mod redb_store;
pub mod store;

pub use context::OpContext;
pub use error::StoreError;
pub use redb_store::{RedbUserStore, DB_FILE_NAME};
pub use store::UserStore;
