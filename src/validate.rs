//! Request body validation, one required field per endpoint.
//!
//! Every check runs before any upstream call, so a rejected request never
//! costs provider quota.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const MAX_MESSAGE_CHARS: usize = 2000;
pub const MAX_PROMPT_CHARS: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field absent or not a string
    #[error("{field} is required and must be a string")]
    Missing { field: &'static str },

    /// Field is only whitespace
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} is too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },

    /// Inference `inputs` absent or neither string nor array
    #[error("Inputs is required and must be a string or array")]
    InvalidInputs,
}

/// Validated body for the inference endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceInput {
    #[serde(skip)]
    pub model: String,
    pub inputs: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

// Shared rule for chat `message` and image `prompt`
fn bounded_text(
    body: &Value,
    key: &str,
    field: &'static str,
    max: usize,
) -> Result<String, ValidationError> {
    let text = body
        .get(key)
        .and_then(Value::as_str)
        .ok_or(ValidationError::Missing { field })?;

    if text.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }

    // utf-16 code units, the unit browsers count in
    if text.encode_utf16().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }

    Ok(text.to_string())
}

pub fn chat_message(body: &Value) -> Result<String, ValidationError> {
    bounded_text(body, "message", "Message", MAX_MESSAGE_CHARS)
}

pub fn image_prompt(body: &Value) -> Result<String, ValidationError> {
    bounded_text(body, "prompt", "Prompt", MAX_PROMPT_CHARS)
}

pub fn inference_input(body: &Value) -> Result<InferenceInput, ValidationError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .ok_or(ValidationError::Missing { field: "Model" })?;

    let inputs = match body.get("inputs") {
        Some(Value::String(s)) if !s.is_empty() => Value::String(s.clone()),
        Some(Value::Array(items)) => Value::Array(items.clone()),
        _ => return Err(ValidationError::InvalidInputs),
    };

    let options = body.get("options").filter(|o| !o.is_null()).cloned();

    Ok(InferenceInput {
        model: model.to_string(),
        inputs,
        options,
    })
}
