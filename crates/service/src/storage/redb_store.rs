//! redb-backed user store.
//!
//! One database file holding one table (`users`): `name -> {"email","age"}`.
//! redb gives us a single writer with MVCC readers, so every mutation is one
//! write transaction and every lookup is one read snapshot. No locking is done
//! above that.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use models::User;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use tracing::{debug, error, info, instrument, warn};

use super::codec;
use super::context::OpContext;
use super::error::StoreError;
use super::store::UserStore;

/// Default database file name inside the data directory.
pub const DB_FILE_NAME: &str = "users.redb";

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Persistence engine over a single redb file.
///
/// `Clone` shares the same handle. The file is released when the last clone
/// is dropped; [`RedbUserStore::close`] does that explicitly at shutdown.
#[derive(Clone)]
pub struct RedbUserStore {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbUserStore {
    /// Open (or create) `dir/users.redb` and make sure the table exists.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_file(dir, DB_FILE_NAME)
    }

    pub fn open_file(dir: impl AsRef<Path>, file_name: &str) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(file_name);

        let db = Database::create(&path)?;

        // Bootstrap is idempotent: opening a table in a write txn creates it if missing.
        let txn = db.begin_write()?;
        txn.open_table(USERS)?;
        txn.commit()?;

        info!(path = %path.display(), "user database opened");
        Ok(Self { db: Arc::new(db), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the database file. Other live clones keep it open until dropped.
    pub fn close(self) {
        let Self { db, path } = self;
        match Arc::try_unwrap(db) {
            Ok(db) => {
                drop(db);
                info!(path = %path.display(), "user database closed");
            }
            Err(_) => {
                warn!(path = %path.display(), "user database still shared; file released when the last handle drops");
            }
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

/// Run `f` in one write transaction: commit on `Ok`, abort on `Err`.
fn write<T>(
    db: &Database,
    f: impl FnOnce(&WriteTransaction) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let txn = db.begin_write()?;
    match f(&txn) {
        Ok(value) => {
            txn.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(abort_err) = txn.abort() {
                warn!(error = %abort_err, "write transaction abort failed");
            }
            Err(e)
        }
    }
}

fn put(db: &Database, user: &User) -> Result<(), StoreError> {
    let bytes = codec::encode(&user.info())?;
    write(db, |txn| {
        let mut table = txn.open_table(USERS)?;
        table.insert(user.name.as_str(), bytes.as_slice())?;
        Ok(())
    })
}

fn put_new(db: &Database, user: &User) -> Result<(), StoreError> {
    let bytes = codec::encode(&user.info())?;
    write(db, |txn| {
        let mut table = txn.open_table(USERS)?;
        let exists = table.get(user.name.as_str())?.is_some_and(|v| !v.value().is_empty());
        if exists {
            return Err(StoreError::conflict(&user.name));
        }
        table.insert(user.name.as_str(), bytes.as_slice())?;
        Ok(())
    })
}

fn fetch(db: &Database, name: &str) -> Result<Option<User>, StoreError> {
    let txn = db.begin_read()?;
    let table = txn.open_table(USERS)?;
    let raw = match table.get(name)? {
        Some(v) => v.value().to_vec(),
        None => return Ok(None),
    };
    if raw.is_empty() {
        return Ok(None);
    }
    codec::decode(name, &raw).map(Some)
}

fn merge(db: &Database, patch: &User) -> Result<User, StoreError> {
    write(db, |txn| {
        let mut table = txn.open_table(USERS)?;
        let current = table.get(patch.name.as_str())?.map(|v| v.value().to_vec());
        let raw = match current {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(StoreError::not_found(&patch.name)),
        };

        let mut info = codec::decode(&patch.name, &raw)?.info();
        if !info.apply(patch) {
            debug!(name = %patch.name, "update carried no changes");
        }
        let bytes = codec::encode(&info)?;
        table.insert(patch.name.as_str(), bytes.as_slice())?;
        Ok(User::from_parts(patch.name.clone(), info))
    })
}

fn remove(db: &Database, name: &str) -> Result<bool, StoreError> {
    write(db, |txn| {
        let mut table = txn.open_table(USERS)?;
        let existed = table.remove(name)?.is_some_and(|v| !v.value().is_empty());
        Ok(existed)
    })
}

fn log_fatal(err: &StoreError) {
    if err.is_fatal() {
        error!(error = %err, "stored value failed to decode; database is corrupted");
    }
}

#[cfg(test)]
impl RedbUserStore {
    /// Write raw bytes under `name`, bypassing the codec.
    pub(crate) fn put_raw(&self, name: &str, raw: &[u8]) -> Result<(), StoreError> {
        write(&self.db, |txn| {
            let mut table = txn.open_table(USERS)?;
            table.insert(name, raw)?;
            Ok(())
        })
    }
}

#[async_trait]
impl UserStore for RedbUserStore {
    #[instrument(skip(self, ctx, user), fields(request_id = %ctx.request_id, name = %user.name))]
    async fn create(&self, ctx: &OpContext, user: &User) -> Result<(), StoreError> {
        let user = user.clone();
        self.blocking(move |db| put(db, &user)).await?;
        debug!("user_stored");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    async fn get(&self, ctx: &OpContext, name: &str) -> Result<Option<User>, StoreError> {
        let key = name.to_string();
        let found = self.blocking(move |db| fetch(db, &key)).await;
        if let Err(e) = &found {
            log_fatal(e);
        }
        found
    }

    #[instrument(skip(self, ctx, patch), fields(request_id = %ctx.request_id, name = %patch.name))]
    async fn update(&self, ctx: &OpContext, patch: &User) -> Result<User, StoreError> {
        let patch = patch.clone();
        let merged = self.blocking(move |db| merge(db, &patch)).await;
        match &merged {
            Ok(_) => debug!("user_merged"),
            Err(e) => log_fatal(e),
        }
        merged
    }

    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    async fn delete(&self, ctx: &OpContext, name: &str) -> Result<bool, StoreError> {
        let key = name.to_string();
        let existed = self.blocking(move |db| remove(db, &key)).await?;
        debug!(existed, "user_removed");
        Ok(existed)
    }

    #[instrument(skip(self, ctx, user), fields(request_id = %ctx.request_id, name = %user.name))]
    async fn create_if_absent(&self, ctx: &OpContext, user: &User) -> Result<(), StoreError> {
        let user = user.clone();
        self.blocking(move |db| put_new(db, &user)).await?;
        debug!("user_stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cleanup, put_raw, temp_dir, temp_store};

    fn raw_value(store: &RedbUserStore, name: &str) -> Option<Vec<u8>> {
        let txn = store.db.begin_read().unwrap();
        let table = txn.open_table(USERS).unwrap();
        let raw = table.get(name).unwrap().map(|v| v.value().to_vec());
        raw
    }


    #[tokio::test]
    async fn alice_lifecycle() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        let ctx = OpContext::new();

        store.create(&ctx, &User::new("alice", "a@x.com", 30)).await?;
        assert_eq!(store.get(&ctx, "alice").await?, Some(User::new("alice", "a@x.com", 30)));

        let merged = store.update(&ctx, &User::new("alice", "", 31)).await?;
        assert_eq!(merged, User::new("alice", "a@x.com", 31));
        assert_eq!(store.get(&ctx, "alice").await?, Some(merged));

        store.delete(&ctx, "alice").await?;
        assert_eq!(store.get(&ctx, "alice").await?, None);

        store.close();
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn get_unknown_name_is_none() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        assert!(store.get(&OpContext::new(), "nobody").await?.is_none());
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_idempotent() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        let ctx = OpContext::new();
        assert!(!store.delete(&ctx, "ghost").await?);

        store.create(&ctx, &User::new("carol", "c@x.com", 22)).await?;
        assert!(store.delete(&ctx, "carol").await?);
        assert!(!store.delete(&ctx, "carol").await?);
        assert!(store.get(&ctx, "carol").await?.is_none());
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_a_corrupted_value_without_decoding() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        let ctx = OpContext::new();
        put_raw(&store, "zed", b"{oops");

        assert!(store.delete(&ctx, "zed").await?);
        assert_eq!(raw_value(&store, "zed"), None);
        assert!(store.get(&ctx, "zed").await?.is_none());
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn update_is_a_sparse_merge() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        let ctx = OpContext::new();
        store.create(&ctx, &User::new("dave", "d@x.com", 40)).await?;

        let only_email = store.update(&ctx, &User::new("dave", "dave@y.org", 0)).await?;
        assert_eq!(only_email, User::new("dave", "dave@y.org", 40));

        let only_age = store.update(&ctx, &User::new("dave", "", 41)).await?;
        assert_eq!(only_age, User::new("dave", "dave@y.org", 41));

        // sentinels cannot clear anything
        let nothing = store.update(&ctx, &User::new("dave", "", 0)).await?;
        assert_eq!(nothing, User::new("dave", "dave@y.org", 41));
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn update_missing_record_fails_without_writing() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        let ctx = OpContext::new();

        let err = store.update(&ctx, &User::new("erin", "e@x.com", 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(raw_value(&store, "erin").is_none());
        assert!(store.get(&ctx, "erin").await?.is_none());
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn create_overwrites_but_create_if_absent_conflicts() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        let ctx = OpContext::new();

        store.create(&ctx, &User::new("frank", "f@x.com", 50)).await?;
        store.create(&ctx, &User::new("frank", "frank@y.org", 0)).await?;
        assert_eq!(store.get(&ctx, "frank").await?, Some(User::new("frank", "frank@y.org", 0)));

        let err = store
            .create_if_absent(&ctx, &User::new("frank", "other@z.net", 9))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.get(&ctx, "frank").await?, Some(User::new("frank", "frank@y.org", 0)));

        store.create_if_absent(&ctx, &User::new("gina", "g@x.com", 7)).await?;
        assert_eq!(store.get(&ctx, "gina").await?, Some(User::new("gina", "g@x.com", 7)));
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn stored_value_excludes_name() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        store.create(&OpContext::new(), &User::new("hank", "h@x.com", 3)).await?;

        let raw = raw_value(&store, "hank").expect("value present");
        let json: serde_json::Value = serde_json::from_slice(&raw)?;
        let obj = json.as_object().expect("json object");
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["email"], "h@x.com");
        assert_eq!(obj["age"], 3);
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn empty_value_reads_as_absent() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        let ctx = OpContext::new();
        put_raw(&store, "ivy", b"");

        assert!(store.get(&ctx, "ivy").await?.is_none());
        let err = store.update(&ctx, &User::new("ivy", "", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_value_is_fatal_and_left_untouched() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        let ctx = OpContext::new();
        put_raw(&store, "jack", b"{not json");

        let err = store.get(&ctx, "jack").await.unwrap_err();
        assert!(err.is_fatal());

        let err = store.update(&ctx, &User::new("jack", "j@x.com", 0)).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(raw_value(&store, "jack").as_deref(), Some(&b"{not json"[..]));
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test]
    async fn records_survive_reopen() -> anyhow::Result<()> {
        let dir = temp_dir();
        let ctx = OpContext::new();

        let store = RedbUserStore::open(&dir)?;
        store.create(&ctx, &User::new("kate", "k@x.com", 28)).await?;
        store.update(&ctx, &User::new("kate", "", 29)).await?;
        store.close();

        // bootstrap runs again on an existing file
        let reopened = RedbUserStore::open(&dir)?;
        assert_eq!(reopened.path(), dir.join(DB_FILE_NAME));
        assert_eq!(reopened.get(&ctx, "kate").await?, Some(User::new("kate", "k@x.com", 29)));
        reopened.close();
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_on_distinct_keys() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;

        let mut handles = Vec::new();
        for i in 0..32u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let user = User::new(format!("user{i}"), format!("u{i}@x.com"), i + 1);
                store.create(&OpContext::new(), &user).await
            }));
        }
        for h in handles {
            h.await??;
        }

        let ctx = OpContext::new();
        for i in 0..32u8 {
            let found = store.get(&ctx, &format!("user{i}")).await?;
            assert_eq!(found, Some(User::new(format!("user{i}"), format!("u{i}@x.com"), i + 1)));
        }
        cleanup(&dir);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_on_one_key_lose_nothing() -> anyhow::Result<()> {
        let (store, dir) = temp_store()?;
        store.create(&OpContext::new(), &User::new("lena", "", 0)).await?;

        let email_task = {
            let store = store.clone();
            tokio::spawn(async move {
                store.update(&OpContext::new(), &User::new("lena", "lena@x.com", 0)).await
            })
        };
        let age_task = {
            let store = store.clone();
            tokio::spawn(async move { store.update(&OpContext::new(), &User::new("lena", "", 33)).await })
        };
        email_task.await??;
        age_task.await??;

        let found = store.get(&OpContext::new(), "lena").await?;
        assert_eq!(found, Some(User::new("lena", "lena@x.com", 33)));
        cleanup(&dir);
        Ok(())
    }
}
