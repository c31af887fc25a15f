use axum::http::HeaderMap;

use crate::config::{LimitsConfig, UpstreamConfig};
use crate::error::ProxyError;
use crate::metrics::RATE_LIMITED_TOTAL;
use crate::rate_limit::{RateLimiter, client_key};
use crate::upstream::{Forwarder, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    Image,
    Inference,
}

impl Endpoint {
    pub fn label(self) -> &'static str {
        match self {
            Endpoint::Chat => "chat",
            Endpoint::Image => "generate-image",
            Endpoint::Inference => "huggingface",
        }
    }

    pub fn provider(self) -> Provider {
        match self {
            Endpoint::Chat => Provider::OpenAi,
            Endpoint::Image => Provider::Stability,
            Endpoint::Inference => Provider::HuggingFace,
        }
    }
}

// app's shared state
pub struct AppState {
    pub forwarder: Forwarder,
    pub chat_limiter: RateLimiter,
    pub image_limiter: RateLimiter,
    pub inference_limiter: RateLimiter,
    pub refund_on_upstream_failure: bool,
}

impl AppState {
    pub fn new(client: reqwest::Client, upstream: UpstreamConfig, limits: LimitsConfig) -> Self {
        Self {
            forwarder: Forwarder::new(client, upstream),
            chat_limiter: RateLimiter::new(limits.chat),
            image_limiter: RateLimiter::new(limits.image),
            inference_limiter: RateLimiter::new(limits.inference),
            refund_on_upstream_failure: limits.refund_on_upstream_failure,
        }
    }

    pub fn limiter(&self, endpoint: Endpoint) -> &RateLimiter {
        match endpoint {
            Endpoint::Chat => &self.chat_limiter,
            Endpoint::Image => &self.image_limiter,
            Endpoint::Inference => &self.inference_limiter,
        }
    }

    pub fn limiters(&self) -> Vec<RateLimiter> {
        vec![
            self.chat_limiter.clone(),
            self.image_limiter.clone(),
            self.inference_limiter.clone(),
        ]
    }

    /// Counts the request against the caller's window. Returns the client key.
    pub fn admit(&self, endpoint: Endpoint, headers: &HeaderMap) -> Result<String, ProxyError> {
        let key = client_key(headers);

        if !self.limiter(endpoint).allow(&key) {
            RATE_LIMITED_TOTAL.with_label_values(&[endpoint.label()]).inc();
            tracing::info!(endpoint = endpoint.label(), client = %key, "rate limit exceeded");
            return Err(ProxyError::RateLimited);
        }

        Ok(key)
    }

    /// Applies the quota policy once the request has finished.
    pub fn settle<T>(&self, endpoint: Endpoint, key: &str, result: &Result<T, ProxyError>) {
        if let Err(err) = result {
            if self.refund_on_upstream_failure && err.is_upstream_failure() {
                self.limiter(endpoint).release(key);
            }
        }
    }
}
