#![cfg(test)]
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::storage::RedbUserStore;

/// Unique, not-yet-created directory under the system temp dir.
pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("svc_users_{}", Uuid::new_v4()))
}

/// Fresh store in its own temp directory.
pub fn temp_store() -> Result<(RedbUserStore, PathBuf), anyhow::Error> {
    let dir = temp_dir();
    let store = RedbUserStore::open(&dir)?;
    Ok((store, dir))
}

pub fn cleanup(dir: &Path) {
    let _ = std::fs::remove_dir_all(dir);
}

/// Store `raw` under `name` as-is, e.g. to plant an undecodable value.
pub fn put_raw(store: &RedbUserStore, name: &str, raw: &[u8]) {
    store.put_raw(name, raw).expect("raw write");
}
