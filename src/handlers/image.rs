use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;

use super::proxy;
use crate::error::ProxyError;
use crate::normalize::{self, ImageReply};
use crate::state::{AppState, Endpoint};
use crate::validate;

// POST /api/generate-image  {prompt} -> {imageUrl}
pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImageReply>, ProxyError> {
    let forwarder = &state.forwarder;

    proxy(&state, Endpoint::Image, &headers, &body, move |payload| async move {
        let prompt = validate::image_prompt(&payload)?;
        let upstream = forwarder.generate_image(&prompt).await?;
        normalize::image_reply(&upstream)
    })
    .await
}
