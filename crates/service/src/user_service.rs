use std::sync::Arc;

use models::User;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::storage::{OpContext, UserStore};

/// Application service for user records.
/// Validates input and enforces name uniqueness on top of a [`UserStore`].
pub struct UserService<S: UserStore> {
    store: Arc<S>,
}

impl<S: UserStore> Clone for UserService<S> {
    fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: UserStore> UserService<S> {
    pub fn new(store: Arc<S>) -> Self { Self { store } }

    /// Create a new user; fails with `Conflict` if the name is taken.
    ///
    /// The existence check and the write share one write transaction, so two
    /// concurrent creates of the same name cannot both succeed.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use models::User;
    /// use service::storage::{OpContext, store::mock::MockUserStore};
    /// use service::user_service::UserService;
    ///
    /// let svc = UserService::new(Arc::new(MockUserStore::default()));
    /// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    /// let ctx = OpContext::new();
    /// let created = rt.block_on(svc.create_user(&ctx, User::new("alice", "a@x.com", 30))).unwrap();
    /// assert_eq!(created.name, "alice");
    /// assert!(rt.block_on(svc.create_user(&ctx, User::new("alice", "", 1))).is_err());
    /// ```
    #[instrument(
        skip(self, ctx, user),
        fields(request_id = %ctx.request_id, name = %user.name, budget_ms = budget_ms(ctx))
    )]
    pub async fn create_user(&self, ctx: &OpContext, user: User) -> Result<User, ServiceError> {
        user.validate()?;
        self.store.create_if_absent(ctx, &user).await?;
        info!(name = %user.name, "user_created");
        Ok(user)
    }

    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id, budget_ms = budget_ms(ctx)))]
    pub async fn get_user(&self, ctx: &OpContext, name: &str) -> Result<Option<User>, ServiceError> {
        let found = self.store.get(ctx, name).await?;
        Ok(found)
    }

    /// Apply the non-empty fields of `patch` to an existing user.
    #[instrument(
        skip(self, ctx, patch),
        fields(request_id = %ctx.request_id, name = %patch.name, budget_ms = budget_ms(ctx))
    )]
    pub async fn update_user(&self, ctx: &OpContext, patch: User) -> Result<User, ServiceError> {
        patch.validate()?;
        let merged = self.store.update(ctx, &patch).await?;
        info!(name = %merged.name, "user_updated");
        Ok(merged)
    }

    /// Delete an existing user; `NotFound` if there is nothing to delete.
    /// The stored value is never decoded, so a corrupted record can still be removed.
    #[instrument(skip(self, ctx), fields(request_id = %ctx.request_id, budget_ms = budget_ms(ctx)))]
    pub async fn delete_user(&self, ctx: &OpContext, name: &str) -> Result<(), ServiceError> {
        if !self.store.delete(ctx, name).await? {
            return Err(ServiceError::not_found("user"));
        }
        info!(%name, "user_deleted");
        Ok(())
    }
}

/// Milliseconds left before the caller's deadline, if it set one.
fn budget_ms(ctx: &OpContext) -> Option<u64> {
    ctx.remaining().map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
