use axum::body::Bytes;
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;

use crate::config::{ProviderEndpoint, UpstreamConfig};
use crate::error::ProxyError;
use crate::validate::InferenceInput;

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Stability,
    HuggingFace,
}

// OpenAI chat completion request format
#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// Stability text-to-image request format
#[derive(Serialize, Debug)]
struct TextToImageRequest<'a> {
    text_prompts: [TextPrompt<'a>; 1],
    cfg_scale: u32,
    height: u32,
    width: u32,
    steps: u32,
    samples: u32,
}

#[derive(Serialize, Debug)]
struct TextPrompt<'a> {
    text: &'a str,
    weight: f64,
}

/// Raw provider answer, interpreted later by `normalize`.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues exactly one outbound POST per proxied request. No retries.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl Forwarder {
    pub fn new(client: reqwest::Client, config: UpstreamConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self, provider: Provider) -> &ProviderEndpoint {
        match provider {
            Provider::OpenAi => &self.config.openai,
            Provider::Stability => &self.config.stability,
            Provider::HuggingFace => &self.config.huggingface,
        }
    }

    /// Fails with [`ProxyError::MissingCredentials`] when the provider has no key.
    pub fn credential(&self, provider: Provider) -> Result<&str, ProxyError> {
        self.endpoint(provider).key().ok_or_else(|| {
            tracing::error!(?provider, "provider credential is not configured");
            ProxyError::MissingCredentials
        })
    }

    fn url(&self, provider: Provider, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint(provider).base_url.trim_end_matches('/'),
            path
        )
    }

    pub async fn chat(&self, message: &str) -> Result<UpstreamResponse, ProxyError> {
        let key = self.credential(Provider::OpenAi)?;
        let payload = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: message,
                },
            ],
            max_tokens: 500,
            temperature: 0.7,
        };

        let request = self
            .client
            .post(self.url(Provider::OpenAi, "v1/chat/completions"))
            .bearer_auth(key)
            .json(&payload);

        send(request).await
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<UpstreamResponse, ProxyError> {
        let key = self.credential(Provider::Stability)?;
        let payload = TextToImageRequest {
            text_prompts: [TextPrompt {
                text: prompt,
                weight: 1.0,
            }],
            cfg_scale: 7,
            height: 1024,
            width: 1024,
            steps: 30,
            samples: 1,
        };

        let path = format!(
            "v1/generation/{}/text-to-image",
            self.config.stability_engine
        );
        let request = self
            .client
            .post(self.url(Provider::Stability, &path))
            .header(ACCEPT, "application/json")
            .bearer_auth(key)
            .json(&payload);

        send(request).await
    }

    pub async fn inference(&self, input: &InferenceInput) -> Result<UpstreamResponse, ProxyError> {
        let key = self.credential(Provider::HuggingFace)?;
        let url = self.model_url(&input.model)?;

        let request = self
            .client
            .post(url)
            .header(ACCEPT, "application/json, image/*")
            .bearer_auth(key)
            .json(input);

        send(request).await
    }

    // models/{model}, with the model id escaped as one path segment
    fn model_url(&self, model: &str) -> Result<Url, ProxyError> {
        let base = &self.config.huggingface.base_url;
        let mut url = Url::parse(base)
            .map_err(|e| ProxyError::Internal(format!("invalid inference base url {base}: {e}")))?;

        url.path_segments_mut()
            .map_err(|_| ProxyError::Internal(format!("inference base url {base} cannot be a base")))?
            .pop_if_empty()
            .push("models")
            .push(model);

        Ok(url)
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<UpstreamResponse, ProxyError> {
    let response = request.send().await?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.bytes().await?;

    Ok(UpstreamResponse {
        status,
        content_type,
        body,
    })
}
