//! Shared helpers for gateway integration tests.
//!
//! Every test points all three providers at one wiremock server and drives
//! the router in-process with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use ai_proxy_gateway::config::{LimitsConfig, ProviderEndpoint, UpstreamConfig};
use ai_proxy_gateway::{AppState, build_router};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

pub const OPENAI_KEY: &str = "test-openai-key";
pub const STABILITY_KEY: &str = "test-stability-key";
pub const HF_TOKEN: &str = "test-hf-token";

pub const CHAT_PATH: &str = "/v1/chat/completions";
pub const IMAGE_PATH: &str = "/v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image";

/// Upstream config with every provider at `base_url` and every key set.
pub fn upstream_config(base_url: &str) -> UpstreamConfig {
    UpstreamConfig {
        openai: ProviderEndpoint::new(base_url).with_key(OPENAI_KEY),
        stability: ProviderEndpoint::new(base_url).with_key(STABILITY_KEY),
        huggingface: ProviderEndpoint::new(base_url).with_key(HF_TOKEN),
        ..UpstreamConfig::default()
    }
}

pub fn router_with(upstream: UpstreamConfig, limits: LimitsConfig) -> Router {
    build_router(Arc::new(AppState::new(
        reqwest::Client::new(),
        upstream,
        limits,
    )))
}

pub fn router(base_url: &str) -> Router {
    router_with(upstream_config(base_url), LimitsConfig::default())
}

/// POSTs a raw body as JSON from `client_ip` and returns status plus parsed body.
pub async fn post_raw(
    router: &Router,
    path: &str,
    body: impl Into<Body>,
    client_ip: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(ip) = client_ip {
        request = request.header("x-forwarded-for", ip);
    }

    let response = router
        .clone()
        .oneshot(request.body(body.into()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

pub async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    post_raw(router, path, body.to_string(), Some("198.51.100.10")).await
}

pub async fn post_json_from(
    router: &Router,
    path: &str,
    body: Value,
    client_ip: &str,
) -> (StatusCode, Value) {
    post_raw(router, path, body.to_string(), Some(client_ip)).await
}
