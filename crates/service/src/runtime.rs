//! Runtime environment helpers
//!
//! Store bootstrap for binary crates, so they only need `service::runtime`.

use std::path::PathBuf;

use crate::storage::RedbUserStore;

/// Open `data_dir/file_name`, creating the directory and file if missing.
/// The open itself blocks, so it runs off the async workers.
pub async fn open_store(data_dir: &str, file_name: &str) -> anyhow::Result<RedbUserStore> {
    if data_dir.trim().is_empty() {
        return Err(anyhow::anyhow!("data directory path is empty"));
    }
    let dir = PathBuf::from(data_dir);
    let file_name = file_name.to_string();
    let store = tokio::task::spawn_blocking(move || RedbUserStore::open_file(&dir, &file_name)).await??;
    Ok(store)
}
