use async_trait::async_trait;
use models::User;

use super::context::OpContext;
use super::error::StoreError;

/// Persistence contract between the service layer and a storage engine.
///
/// Records are keyed by `User::name`; the payload holds only `email` and `age`.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Write `user` under its name. Overwrites an existing record; callers that
    /// need uniqueness use [`UserStore::create_if_absent`].
    async fn create(&self, ctx: &OpContext, user: &User) -> Result<(), StoreError>;

    /// `Ok(None)` when no record exists for `name`.
    async fn get(&self, ctx: &OpContext, name: &str) -> Result<Option<User>, StoreError>;

    /// Sparse merge of `patch` into the stored record, atomically.
    /// Fails with `NotFound` (and writes nothing) when the record is missing.
    async fn update(&self, ctx: &OpContext, patch: &User) -> Result<User, StoreError>;

    /// Remove `name` without decoding its value. Removing a missing record
    /// succeeds; the returned flag says whether a record was there.
    async fn delete(&self, ctx: &OpContext, name: &str) -> Result<bool, StoreError>;

    /// Check-and-write in a single write transaction; `Conflict` if `name` exists.
    async fn create_if_absent(&self, ctx: &OpContext, user: &User) -> Result<(), StoreError>;
}

/// In-memory store with the same semantics, for service tests and doc examples.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};

    use models::UserInfo;

    #[derive(Default)]
    pub struct MockUserStore {
        records: Mutex<HashMap<String, UserInfo>>, // key: name
    }

    impl MockUserStore {
        fn records(&self) -> Result<MutexGuard<'_, HashMap<String, UserInfo>>, StoreError> {
            self.records.lock().map_err(|e| StoreError::Storage(e.to_string()))
        }

        pub fn len(&self) -> usize {
            self.records().map(|r| r.len()).unwrap_or_default()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl UserStore for MockUserStore {
        async fn create(&self, _ctx: &OpContext, user: &User) -> Result<(), StoreError> {
            self.records()?.insert(user.name.clone(), user.info());
            Ok(())
        }

        async fn get(&self, _ctx: &OpContext, name: &str) -> Result<Option<User>, StoreError> {
            let records = self.records()?;
            Ok(records.get(name).cloned().map(|info| User::from_parts(name, info)))
        }

        async fn update(&self, _ctx: &OpContext, patch: &User) -> Result<User, StoreError> {
            let mut records = self.records()?;
            let info = records.get_mut(&patch.name).ok_or_else(|| StoreError::not_found(&patch.name))?;
            info.apply(patch);
            Ok(User::from_parts(patch.name.clone(), info.clone()))
        }

        async fn delete(&self, _ctx: &OpContext, name: &str) -> Result<bool, StoreError> {
            Ok(self.records()?.remove(name).is_some())
        }

        async fn create_if_absent(&self, _ctx: &OpContext, user: &User) -> Result<(), StoreError> {
            let mut records = self.records()?;
            if records.contains_key(&user.name) {
                return Err(StoreError::conflict(&user.name));
            }
            records.insert(user.name.clone(), user.info());
            Ok(())
        }
    }
}
