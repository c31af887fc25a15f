use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::handlers::{
    chat_handler, health_handler, image_handler, index_handler, inference_handler,
    metrics_handler,
};
use crate::state::AppState;

// creating the router with routes
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/generate-image", post(image_handler))
        .route("/api/huggingface", post(inference_handler))
        .with_state(state)
}
