use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::api::root))
        .route("/chat", post(handlers::api::chat))
        .route("/schema", get(handlers::api::get_schema))
        .route("/health", get(handlers::api::health_check))
}
