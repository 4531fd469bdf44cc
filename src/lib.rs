pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod store;

use std::sync::Arc;

use axum::{extract::FromRef, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

use auth::SessionResolver;
use registry::RoomRegistry;

pub use config::Config;
pub use error::{AppError, AppResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub registry: Arc<RoomRegistry>,
    pub sessions: Arc<dyn SessionResolver>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1/chat", chat::router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to the lovenotes chat API!" }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
