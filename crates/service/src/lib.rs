//! Service layer for the user store.
//! - `storage`: the persistence contract and the embedded redb engine.
//! - `user_service`: validation and uniqueness policy on top of a store.
//! - Provides clear error types and documented interfaces.

pub mod errors;
pub mod runtime;
pub mod storage;
pub mod user_service;
#[cfg(test)]
pub mod test_support;

pub use user_service::UserService;
