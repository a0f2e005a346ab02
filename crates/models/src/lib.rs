//! Domain types for the user store.
//! - `user`: the record, its stored payload and the sparse merge rule
//! - `errors`: validation errors shared by the service layer

pub mod errors;
pub mod user;

pub use user::{User, UserChanges, UserInfo};
