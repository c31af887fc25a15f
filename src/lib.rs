//! Same-origin gateway in front of three AI providers: chat completion,
//! image generation and generic model inference.
//!
//! Each proxy endpoint runs the same cycle: credential check, per-client
//! fixed-window rate limit, input validation, one upstream call, and
//! response normalization into a small JSON contract.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod normalize;
pub mod rate_limit;
pub mod state;
pub mod upstream;
pub mod validate;

pub use app::build_router;
pub use error::ProxyError;
pub use state::AppState;
