mod chat;
mod health;
mod image;
mod inference;
mod metrics;
mod ui;

pub use chat::chat_handler;
pub use health::health_handler;
pub use image::image_handler;
pub use inference::inference_handler;
pub use metrics::metrics_handler;
pub use ui::index_handler;

use axum::Json;
use axum::http::HeaderMap;
use serde_json::Value;
use std::future::Future;

use crate::error::ProxyError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL, UPSTREAM_ERRORS};
use crate::state::{AppState, Endpoint};

// Shared request cycle for the three proxy endpoints:
// credentials -> rate limit -> parse -> validate + forward + normalize
async fn proxy<T, F, Fut>(
    state: &AppState,
    endpoint: Endpoint,
    headers: &HeaderMap,
    body: &[u8],
    forward: F,
) -> Result<Json<T>, ProxyError>
where
    F: FnOnce(Value) -> Fut,
    Fut: Future<Output = Result<T, ProxyError>>,
{
    let label = endpoint.label();
    REQUEST_TOTAL.with_label_values(&[label]).inc();
    // observes on drop, early exits included
    let _timer = REQUEST_LATENCY.with_label_values(&[label]).start_timer();

    state.forwarder.credential(endpoint.provider())?;
    let key = state.admit(endpoint, headers)?;

    let payload: Value = serde_json::from_slice(body).map_err(|_| ProxyError::MalformedBody)?;

    let result = forward(payload).await;

    if let Err(err) = &result {
        if err.is_upstream_failure() {
            let status = upstream_status_label(err);
            UPSTREAM_ERRORS
                .with_label_values(&[label, status.as_str()])
                .inc();
        }
    }
    state.settle(endpoint, &key, &result);

    result.map(Json)
}

fn upstream_status_label(err: &ProxyError) -> String {
    match err {
        ProxyError::Upstream { provider_status, .. } => provider_status.to_string(),
        ProxyError::Transport(_) => "transport".to_string(),
        _ => "empty".to_string(),
    }
}
