use std::sync::Arc;

use axum::{
    response::Html,
    routing::{get, post},
    Json, Router,
};
use tokio::sync::Notify;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use common::types::Health;
use service::{storage::RedbUserStore, UserService};

pub mod users;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <style>
        h1, p {
            text-align: center;
        }
    </style>
</head>
<body>
    <h1>User Database</h1>
    <p>Welcome to the DB</p>
</body>
</html>
"#;

/// Shared handler state: the user service and the fatal-error shutdown trigger.
#[derive(Clone)]
pub struct ServerState {
    pub users: UserService<RedbUserStore>,
    pub shutdown: Arc<Notify>,
}

impl ServerState {
    pub fn new(store: Arc<RedbUserStore>) -> Self {
        Self { users: UserService::new(store), shutdown: Arc::new(Notify::new()) }
    }
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/users/create", post(users::create_user).put(users::create_user))
        .route(
            "/users/:name",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
