use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use std::sync::Arc;

use super::proxy;
use crate::error::ProxyError;
use crate::normalize::{self, ChatReply};
use crate::state::{AppState, Endpoint};
use crate::validate;

// POST /api/chat  {message} -> {reply}
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatReply>, ProxyError> {
    let forwarder = &state.forwarder;

    proxy(&state, Endpoint::Chat, &headers, &body, move |payload| async move {
        let message = validate::chat_message(&payload)?;
        let upstream = forwarder.chat(&message).await?;
        normalize::chat_reply(&upstream)
    })
    .await
}
