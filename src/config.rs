use clap::Parser;
use std::time::Duration;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "ai-proxy-gateway")]
#[command(about = "Same-origin proxy for chat, image and inference AI providers")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    // Provider credentials, a missing one disables only its endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "STABILITY_API_KEY", hide_env_values = true)]
    pub stability_api_key: Option<String>,

    #[arg(long, env = "HUGGINGFACE_API_TOKEN", hide_env_values = true)]
    pub huggingface_api_token: Option<String>,

    // Upstream base urls
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "STABILITY_BASE_URL", default_value = DEFAULT_STABILITY_URL)]
    pub stability_base_url: String,

    #[arg(long, env = "HUGGINGFACE_BASE_URL", default_value = DEFAULT_HUGGINGFACE_URL)]
    pub huggingface_base_url: String,

    // Chat completion model identifier
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    // Stability text-to-image engine
    #[arg(long, env = "STABILITY_ENGINE", default_value = DEFAULT_STABILITY_ENGINE)]
    pub stability_engine: String,

    // Rate limit max requests per window, per endpoint
    #[arg(long, default_value_t = 10)]
    pub chat_rate_limit: u32,

    #[arg(long, default_value_t = 5)]
    pub image_rate_limit: u32,

    #[arg(long, default_value_t = 10)]
    pub inference_rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Interval between expired rate-limit entry sweeps, in seconds
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Give quota back when the upstream call fails
    #[arg(long, default_value_t = false)]
    pub refund_on_upstream_failure: bool,
}

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
pub const DEFAULT_STABILITY_URL: &str = "https://api.stability.ai";
pub const DEFAULT_HUGGINGFACE_URL: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_STABILITY_ENGINE: &str = "stable-diffusion-xl-1024-v1-0";

/// One upstream provider: where it lives and the credential sent to it.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// The configured key, treating an empty value as absent.
    pub fn key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Everything the forwarder needs to reach the three providers.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub openai: ProviderEndpoint,
    pub stability: ProviderEndpoint,
    pub huggingface: ProviderEndpoint,
    pub chat_model: String,
    pub stability_engine: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            openai: ProviderEndpoint::new(DEFAULT_OPENAI_URL),
            stability: ProviderEndpoint::new(DEFAULT_STABILITY_URL),
            huggingface: ProviderEndpoint::new(DEFAULT_HUGGINGFACE_URL),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            stability_engine: DEFAULT_STABILITY_ENGINE.to_string(),
        }
    }
}

/// Limit and window for one endpoint's limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            window: Duration::from_secs(60),
        }
    }
}

/// Per-endpoint limiter settings plus the quota refund policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitsConfig {
    pub chat: RateLimitConfig,
    pub image: RateLimitConfig,
    pub inference: RateLimitConfig,
    pub refund_on_upstream_failure: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            chat: RateLimitConfig::per_minute(10),
            // image generation costs more upstream
            image: RateLimitConfig::per_minute(5),
            inference: RateLimitConfig::per_minute(10),
            refund_on_upstream_failure: false,
        }
    }
}

impl Args {
    pub fn upstream_config(&self) -> UpstreamConfig {
        let endpoint = |url: &str, key: &Option<String>| ProviderEndpoint {
            base_url: url.to_string(),
            api_key: key.clone(),
        };

        UpstreamConfig {
            openai: endpoint(&self.openai_base_url, &self.openai_api_key),
            stability: endpoint(&self.stability_base_url, &self.stability_api_key),
            huggingface: endpoint(&self.huggingface_base_url, &self.huggingface_api_token),
            chat_model: self.chat_model.clone(),
            stability_engine: self.stability_engine.clone(),
        }
    }

    pub fn limits_config(&self) -> LimitsConfig {
        let window = Duration::from_secs(self.rate_window);
        let limit = |limit| RateLimitConfig { limit, window };

        LimitsConfig {
            chat: limit(self.chat_rate_limit),
            image: limit(self.image_rate_limit),
            inference: limit(self.inference_rate_limit),
            refund_on_upstream_failure: self.refund_on_upstream_failure,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_make_image_stricter() {
        let limits = LimitsConfig::default();
        assert_eq!(limits.chat.limit, 10);
        assert_eq!(limits.inference.limit, 10);
        assert_eq!(limits.image.limit, 5);
        assert_eq!(limits.image.window, Duration::from_secs(60));
        assert!(!limits.refund_on_upstream_failure);
    }

    #[test]
    fn test_args_build_per_endpoint_limits() {
        let args = Args::try_parse_from([
            "ai-proxy-gateway",
            "--image-rate-limit",
            "2",
            "--rate-window",
            "30",
            "--refund-on-upstream-failure",
        ])
        .unwrap();

        let limits = args.limits_config();
        assert_eq!(limits.image, RateLimitConfig { limit: 2, window: Duration::from_secs(30) });
        assert_eq!(limits.chat.window, Duration::from_secs(30));
        assert!(limits.refund_on_upstream_failure);
    }

    #[test]
    fn test_args_carry_base_urls_into_upstream_config() {
        let args = Args::try_parse_from([
            "ai-proxy-gateway",
            "--openai-base-url",
            "http://127.0.0.1:9000",
            "--chat-model",
            "gpt-4o-mini",
        ])
        .unwrap();

        let upstream = args.upstream_config();
        assert_eq!(upstream.openai.base_url, "http://127.0.0.1:9000");
        assert_eq!(upstream.chat_model, "gpt-4o-mini");
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let endpoint = ProviderEndpoint::new("http://localhost").with_key("   ");
        assert!(endpoint.key().is_none());

        let endpoint = ProviderEndpoint::new("http://localhost").with_key("sk-test");
        assert_eq!(endpoint.key(), Some("sk-test"));
    }
}
