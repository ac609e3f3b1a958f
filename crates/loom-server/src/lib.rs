pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use loom_core::config::{Config, WarnLevel};
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Status
        .route("/api/status", get(routes::status::get_status))
        // Prompts
        .route("/api/prompts", get(routes::prompts::list_prompts))
        .route("/api/prompts/allData", get(routes::prompts::list_prompts))
        .route("/api/prompts/start", post(routes::prompts::start_batch))
        .route("/api/prompts/stop", post(routes::prompts::stop_batch))
        .route("/api/prompts/resubmit", post(routes::prompts::resubmit))
        .route("/api/prompts/{id}", get(routes::prompts::get_prompt))
        // Seeds
        .route(
            "/api/seeds",
            get(routes::seeds::list_seeds).post(routes::seeds::add_seed),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the loom server on `port`.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener).await
}

/// Start the loom server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let config = Config::load(&root)?;
    let mut fatal = false;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => {
                tracing::error!("{}", w.message);
                fatal = true;
            }
        }
    }
    if fatal {
        anyhow::bail!("invalid configuration in {}", loom_core::paths::config_path(&root).display());
    }

    let actual_port = listener.local_addr()?.port();
    let app = build_router(state::AppState::new(root, &config)?);

    tracing::info!("loom server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
