//! `api` crate — the external HTTP surface (C7) over the workflow engine.
//!
//! Exposes:
//!   POST   /api/v1/workflows
//!   GET    /api/v1/workflows
//!   GET    /api/v1/workflows/:id
//!   PUT    /api/v1/workflows/:id
//!   DELETE /api/v1/workflows/:id
//!   POST   /api/v1/executions
//!   GET    /api/v1/executions
//!   GET    /api/v1/executions/:id
//!   POST   /api/v1/executions/:id/stop
//!   POST   /api/v1/executions/:id/retry
//!   GET    /api/v1/executions/:id/state
//!   GET    /api/v1/executions/:id/metrics
//!   POST   /api/v1/executions/batch
//!   POST   /webhook/:path

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use db::DbPool;
use engine::Engine;
use queue::TaskQueue;
use state::StateStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared handler state — the three facades a request might need, plus the
/// raw pool for the read-only listing/fetch paths that don't go through
/// `Engine`.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub engine: Engine,
    pub state: Arc<StateStore>,
    pub queue: Arc<TaskQueue>,
}

pub fn router(app_state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let workflows = Router::new()
        .route("/workflows", get(handlers::workflows::list).post(handlers::workflows::create))
        .route(
            "/workflows/:id",
            get(handlers::workflows::get)
                .put(handlers::workflows::update)
                .delete(handlers::workflows::delete),
        );

    let executions = Router::new()
        .route("/executions", get(handlers::executions::list).post(handlers::executions::start))
        .route("/executions/batch", post(handlers::executions::batch))
        .route("/executions/:id", get(handlers::executions::get))
        .route("/executions/:id/stop", post(handlers::executions::stop))
        .route("/executions/:id/retry", post(handlers::executions::retry))
        .route("/executions/:id/state", get(handlers::executions::state))
        .route("/executions/:id/metrics", get(handlers::executions::metrics));

    let api_v1 = workflows.merge(executions);

    Router::new()
        .nest("/api/v1", api_v1)
        .route("/webhook/:path", post(handlers::webhooks::handle))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn serve(bind: &str, app_state: AppState) -> Result<(), std::io::Error> {
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
