pub mod admin;
pub mod auth;
pub mod error;
pub mod lifecycle;
pub mod read;
pub mod state;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        // Admin (nonce + detached-signature auth)
        .route("/admin/nonce", get(admin::issue_nonce))
        .route("/admin/config", post(admin::update_config))
        .route("/admin/jobs", get(admin::list_jobs))
        .route("/admin/jobs/{job}/trigger", post(admin::trigger_job))
        .route("/admin/tokens/{mint}/config", post(admin::update_token_config))
        .route("/admin/wheel", get(admin::wheel_status))
        // Lifecycle (onboarding/launch collaborators)
        .route("/lifecycle/pending", post(lifecycle::create_pending))
        .route("/lifecycle/pending/{id}/cancel", post(lifecycle::cancel_pending))
        .route("/lifecycle/register", post(lifecycle::register_token))
        .route("/lifecycle/reactivate", post(lifecycle::reactivate_token))
        // Read (user-facing UIs)
        .route("/tokens", get(read::list_tokens))
        .route("/tokens/{mint}", get(read::token_detail))
        .route("/tokens/{mint}/claimable", get(read::claimable_amount))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    shutdown: broadcast::Sender<()>,
) -> Result<()> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    println!("flywheel API listening on {addr}");
    println!("  Health:    GET  http://{addr}/health");
    println!("  Admin:     GET  http://{addr}/admin/jobs");
    println!("  Lifecycle: POST http://{addr}/lifecycle/register");
    println!("  Tokens:    GET  http://{addr}/tokens");

    let mut rx = shutdown.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = rx.recv().await;
        })
        .await
        .context("running API server")?;
    Ok(())
}
