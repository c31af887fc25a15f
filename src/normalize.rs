use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;

use crate::error::ProxyError;
use crate::upstream::UpstreamResponse;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ImageReply {
    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum InferenceReply {
    // json output: extracted text (or null) plus the parsed body
    Json { result: Option<String>, raw: Value },
    Image {
        #[serde(rename = "imageUrl")]
        image_url: String,
    },
    Text { result: String },
}

fn upstream_error(status: StatusCode, provider_status: u16, message: &'static str) -> ProxyError {
    ProxyError::Upstream {
        status,
        provider_status,
        message,
        diagnostic: None,
    }
}

pub fn data_url(media_type: &str, payload_b64: &str) -> String {
    format!("data:{media_type};base64,{payload_b64}")
}

// Provider error body as JSON when possible, otherwise as a string
fn error_body(body: &[u8]) -> Value {
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

pub fn chat_status(provider_status: u16) -> ProxyError {
    match provider_status {
        401 => upstream_error(StatusCode::UNAUTHORIZED, 401, "Invalid API key"),
        429 => upstream_error(StatusCode::TOO_MANY_REQUESTS, 429, "OpenAI API rate limit exceeded"),
        400 => upstream_error(StatusCode::BAD_REQUEST, 400, "Invalid request to OpenAI API"),
        other => upstream_error(StatusCode::INTERNAL_SERVER_ERROR, other, "Internal server error"),
    }
}

pub fn chat_reply(upstream: &UpstreamResponse) -> Result<ChatReply, ProxyError> {
    if !upstream.is_success() {
        tracing::warn!(status = upstream.status, body = %String::from_utf8_lossy(&upstream.body), "chat provider error");
        return Err(chat_status(upstream.status));
    }

    let body: Value = serde_json::from_slice(&upstream.body)
        .map_err(|e| ProxyError::Internal(format!("chat completion is not JSON: {e}")))?;

    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|reply| !reply.is_empty())
        .map(|reply| ChatReply {
            reply: reply.to_string(),
        })
        .ok_or(ProxyError::NoResult("No response from ChatGPT"))
}

pub fn image_status(provider_status: u16) -> ProxyError {
    match provider_status {
        401 => upstream_error(StatusCode::UNAUTHORIZED, 401, "Invalid Stability API key"),
        429 => upstream_error(StatusCode::TOO_MANY_REQUESTS, 429, "Stability API rate limit exceeded"),
        400 => upstream_error(StatusCode::BAD_REQUEST, 400, "Invalid request to Stability API"),
        other => upstream_error(StatusCode::INTERNAL_SERVER_ERROR, other, "Failed to generate image"),
    }
}

pub fn image_reply(upstream: &UpstreamResponse) -> Result<ImageReply, ProxyError> {
    if !upstream.is_success() {
        tracing::warn!(status = upstream.status, body = %error_body(&upstream.body), "image provider error");
        return Err(image_status(upstream.status));
    }

    let body: Value = serde_json::from_slice(&upstream.body)
        .map_err(|_| ProxyError::NoResult("No image generated"))?;

    // full decode so every data url handed out is well-formed
    let payload = body
        .pointer("/artifacts/0/base64")
        .and_then(Value::as_str)
        .filter(|b64| !b64.is_empty() && STANDARD.decode(b64).is_ok())
        .ok_or(ProxyError::NoResult("No image generated"))?;

    Ok(ImageReply {
        image_url: data_url("image/png", payload),
    })
}

pub type ShapeMatcher = fn(&Value) -> Option<String>;

fn plain_string(data: &Value) -> Option<String> {
    data.as_str().map(str::to_string)
}

fn non_empty_generated_text(item: &Value) -> Option<String> {
    item.get("generated_text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn first_generated_text(data: &Value) -> Option<String> {
    data.as_array()?.first().and_then(non_empty_generated_text)
}

fn generated_text(data: &Value) -> Option<String> {
    data.as_object()?;
    non_empty_generated_text(data)
}

fn first_string(data: &Value) -> Option<String> {
    data.as_array()?.first()?.as_str().map(str::to_string)
}

// tried in order, first match wins
pub const SHAPE_MATCHERS: &[ShapeMatcher] = &[
    plain_string,
    first_generated_text,
    generated_text,
    first_string,
];

pub fn extract_text(data: &Value) -> Option<String> {
    SHAPE_MATCHERS.iter().find_map(|matcher| matcher(data))
}

pub fn inference_status(provider_status: u16, body: &[u8]) -> ProxyError {
    let diagnostic = error_body(body);
    tracing::warn!(status = provider_status, body = %diagnostic, "inference provider error");

    let (status, message) = match provider_status {
        401 => (StatusCode::UNAUTHORIZED, "Invalid Hugging Face API token"),
        404 => (
            StatusCode::NOT_FOUND,
            "Model not found. Check the model name and visibility (private models require proper token)",
        ),
        429 => (StatusCode::TOO_MANY_REQUESTS, "Hugging Face rate limit exceeded"),
        other => (
            StatusCode::from_u16(other).unwrap_or(StatusCode::BAD_GATEWAY),
            "Hugging Face API error",
        ),
    };

    ProxyError::Upstream {
        status,
        provider_status,
        message,
        diagnostic: Some(diagnostic),
    }
}

pub fn inference_reply(upstream: &UpstreamResponse) -> Result<InferenceReply, ProxyError> {
    if !upstream.is_success() {
        return Err(inference_status(upstream.status, &upstream.body));
    }

    let content_type = upstream.content_type.to_ascii_lowercase();

    if content_type.contains("application/json") {
        let raw: Value = serde_json::from_slice(&upstream.body)
            .map_err(|e| ProxyError::Internal(format!("inference output is not JSON: {e}")))?;
        return Ok(InferenceReply::Json {
            result: extract_text(&raw),
            raw,
        });
    }

    if content_type.starts_with("image/") || content_type.starts_with("application/octet-stream") {
        return Ok(InferenceReply::Image {
            image_url: data_url(&upstream.content_type, &STANDARD.encode(&upstream.body)),
        });
    }

    Ok(InferenceReply::Text {
        result: String::from_utf8_lossy(&upstream.body).into_owned(),
    })
}
