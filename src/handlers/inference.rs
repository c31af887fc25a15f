use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;

use super::proxy;
use crate::error::ProxyError;
use crate::normalize::{self, InferenceReply};
use crate::state::{AppState, Endpoint};
use crate::validate;

// POST /api/huggingface  {model, inputs, options?} -> {result, raw?} | {imageUrl}
pub async fn inference_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InferenceReply>, ProxyError> {
    let forwarder = &state.forwarder;

    proxy(&state, Endpoint::Inference, &headers, &body, move |payload| async move {
        let input = validate::inference_input(&payload)?;
        tracing::debug!(model = %input.model, "forwarding inference request");
        let upstream = forwarder.inference(&input).await?;
        normalize::inference_reply(&upstream)
    })
    .await
}
