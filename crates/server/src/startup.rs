use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::Router;
use configs::AppConfig;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::errors::StartupError;
use crate::routes::{self, ServerState};
use service::{runtime, storage::RedbUserStore};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Serve the user API on `listener` until `signal` resolves or a handler
/// reports a fatal store error, then close the database.
///
/// Returns an error when the server stopped because of a fatal store error.
pub async fn serve<F>(listener: TcpListener, store: RedbUserStore, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = Arc::new(store);
    let state = ServerState::new(Arc::clone(&store));
    let shutdown = Arc::clone(&state.shutdown);
    let fatal = Arc::new(AtomicBool::new(false));

    let app: Router = routes::build_router(state, build_cors());

    let stop = {
        let fatal = Arc::clone(&fatal);
        async move {
            tokio::select! {
                _ = signal => info!("shutdown signal received"),
                _ = shutdown.notified() => {
                    fatal.store(true, Ordering::SeqCst);
                    warn!("stopping after fatal store error");
                }
            }
        }
    };

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "user api listening");
    }
    axum::serve(listener, app).with_graceful_shutdown(stop).await?;

    Arc::unwrap_or_clone(store).close();

    if fatal.load(Ordering::SeqCst) {
        return Err(anyhow::anyhow!("server stopped after a fatal store error"));
    }
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Public entry: open the configured store and run the HTTP server until Ctrl+C.
///
/// The caller loads `.env`, installs logging and resolves `cfg` first.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let store = runtime::open_store(&cfg.database.data_dir, &cfg.database.file_name)
        .await
        .map_err(|e| StartupError::Runtime(e.to_string()))?;

    let addr = cfg.server.bind_addr();
    let listener = TcpListener::bind(addr.as_str()).await?;
    info!(%addr, db = %store.path().display(), "starting user server");

    serve(listener, store, ctrl_c()).await
}
