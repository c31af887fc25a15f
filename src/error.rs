use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use thiserror::Error;

use crate::validate::ValidationError;

/// Each variant maps to one status code and a `{"error": ...}` JSON body.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Server configuration error")]
    MissingCredentials,

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Invalid JSON body")]
    MalformedBody,

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{message}")]
    Upstream {
        status: StatusCode,
        provider_status: u16,
        message: &'static str,
        // echoed back as hfBody when set
        diagnostic: Option<Value>,
    },

    // 2xx without the expected payload
    #[error("{0}")]
    NoResult(&'static str),

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingCredentials => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::MalformedBody | ProxyError::Invalid(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream { status, .. } => *status,
            ProxyError::NoResult(_) | ProxyError::Transport(_) | ProxyError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True when the failure happened at or after the provider call.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::Upstream { .. } | ProxyError::NoResult(_) | ProxyError::Transport(_)
        )
    }

    fn public_message(&self) -> String {
        match self {
            // details stay in the server log
            ProxyError::Transport(_) | ProxyError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let ProxyError::Transport(_) | ProxyError::Internal(_) = &self {
            tracing::error!(error = %self, "request failed");
        }

        let mut body = json!({ "error": self.public_message() });
        if let ProxyError::Upstream {
            provider_status,
            diagnostic: Some(diagnostic),
            ..
        } = self
        {
            body["hfStatus"] = json!(provider_status);
            body["hfBody"] = diagnostic;
        }

        (status, Json(body)).into_response()
    }
}
