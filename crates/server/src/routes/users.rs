use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use models::{User, UserChanges};
use service::{errors::ServiceError, storage::OpContext};
use tracing::error;

use crate::errors::JsonApiError;
use crate::routes::ServerState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn request_context() -> OpContext {
    OpContext::new().with_timeout(REQUEST_TIMEOUT)
}

/// Map a service error to a response, asking the server to stop if the
/// store reported something it cannot recover from.
fn fail(state: &ServerState, ctx: &OpContext, e: ServiceError) -> JsonApiError {
    if e.is_fatal() {
        error!(request_id = %ctx.request_id, err = %e, "fatal store error, shutting down");
        state.shutdown.notify_one();
    }
    JsonApiError::from(e)
}

/// 创建用户
pub async fn create_user(
    State(state): State<ServerState>,
    payload: Result<Json<User>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), JsonApiError> {
    let Json(user) = payload?;
    let ctx = request_context();
    state
        .users
        .create_user(&ctx, user)
        .await
        .map(|u| (StatusCode::CREATED, Json(u)))
        .map_err(|e| fail(&state, &ctx, e))
}

/// 获取用户
pub async fn get_user(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> Result<Json<User>, JsonApiError> {
    let ctx = request_context();
    match state.users.get_user(&ctx, &name).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(JsonApiError::from(ServiceError::not_found("user"))),
        Err(e) => Err(fail(&state, &ctx, e)),
    }
}

/// 部分更新用户：只覆盖非空字段
pub async fn update_user(
    State(state): State<ServerState>,
    Path(name): Path<String>,
    payload: Result<Json<UserChanges>, JsonRejection>,
) -> Result<Json<User>, JsonApiError> {
    let Json(changes) = payload?;
    let ctx = request_context();
    state
        .users
        .update_user(&ctx, changes.into_patch(name))
        .await
        .map(Json)
        .map_err(|e| fail(&state, &ctx, e))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> Result<StatusCode, JsonApiError> {
    let ctx = request_context();
    state
        .users
        .delete_user(&ctx, &name)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| fail(&state, &ctx, e))
}
