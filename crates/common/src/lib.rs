//! Shared helpers used by the server binary and the library crates.
//! - `utils::logging`: tracing subscriber setup
//! - `types`: small response types shared across crates

pub mod types;
pub mod utils;
