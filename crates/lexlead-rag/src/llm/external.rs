//! Hosted chat models over HTTP.
//!
//! Three wire formats cover every supported provider: OpenAI-style chat
//! completions (OpenAI, OpenRouter, Together, Ollama, custom gateways),
//! Anthropic messages and Gemini `generateContent`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::{ApiProvider, GenerationConfig, LLMProvider, ProviderInfo};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    ChatCompletions,
    AnthropicMessages,
    GeminiGenerate,
}

impl WireFormat {
    fn of(provider: &ApiProvider) -> Self {
        match provider {
            ApiProvider::Anthropic => Self::AnthropicMessages,
            ApiProvider::Google => Self::GeminiGenerate,
            ApiProvider::OpenAI
            | ApiProvider::OpenRouter
            | ApiProvider::Together
            | ApiProvider::Ollama
            | ApiProvider::Custom { .. } => Self::ChatCompletions,
        }
    }
}

pub struct ExternalProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl ExternalProvider {
    pub fn new(provider: ApiProvider, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build HTTP client")?;
        let endpoint = endpoint_for(&provider, &model);

        tracing::info!(provider = ?provider, model = %model, endpoint = %endpoint, "Using hosted model");

        Ok(Self {
            provider,
            api_key,
            model,
            endpoint,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, prompt: &str, config: &GenerationConfig) -> RequestBuilder {
        let post = self.client.post(&self.endpoint);
        match WireFormat::of(&self.provider) {
            WireFormat::ChatCompletions => {
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = &config.system_prompt {
                    messages.push(ChatMessage { role: "system", content: system });
                }
                messages.push(ChatMessage { role: "user", content: prompt });
                post.bearer_auth(&self.api_key).json(&ChatRequest {
                    model: &self.model,
                    messages,
                    max_tokens: config.max_tokens,
                    temperature: config.temperature,
                    top_p: config.top_p,
                    stop: &config.stop_sequences,
                    stream: false,
                })
            }
            WireFormat::AnthropicMessages => post
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&AnthropicRequest {
                    model: &self.model,
                    system: config.system_prompt.as_deref(),
                    messages: vec![ChatMessage { role: "user", content: prompt }],
                    max_tokens: config.max_tokens,
                    temperature: config.temperature,
                    top_p: config.top_p,
                    stop_sequences: &config.stop_sequences,
                }),
            WireFormat::GeminiGenerate => post
                .header("x-goog-api-key", &self.api_key)
                .json(&GeminiRequest {
                    system_instruction: config
                        .system_prompt
                        .as_deref()
                        .map(GeminiContent::text),
                    contents: vec![GeminiContent::text(prompt)],
                    generation_config: GeminiGenerationConfig {
                        temperature: config.temperature,
                        top_p: config.top_p,
                        max_output_tokens: config.max_tokens,
                        stop_sequences: &config.stop_sequences,
                    },
                }),
        }
    }

    /// POST and read the body, turning transport failures, non-2xx statuses
    /// and HTML gateway pages into errors that name the endpoint.
    async fn call(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timed out"
            } else if e.is_connect() {
                "could not connect"
            } else {
                "failed"
            };
            tracing::error!(endpoint = %self.endpoint, error = %e, "Model request {}", kind);
            anyhow!("Request to {} {}: {}", self.endpoint, kind, e)
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", self.endpoint))?;

        if !status.is_success() {
            tracing::error!(endpoint = %self.endpoint, status = %status, "Model API returned error");
            return Err(anyhow!("API error ({}) from {}: {}", status, self.endpoint, preview(&body)));
        }
        if body.trim_start().starts_with('<') {
            return Err(anyhow!(
                "{} answered with an HTML page instead of JSON (HTTP {}): {}",
                self.endpoint,
                status,
                preview(&body)
            ));
        }
        Ok(body)
    }
}

fn endpoint_for(provider: &ApiProvider, model: &str) -> String {
    match provider {
        ApiProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
        ApiProvider::Anthropic => "https://api.anthropic.com/v1/messages".to_string(),
        ApiProvider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions".to_string(),
        ApiProvider::Together => "https://api.together.xyz/v1/chat/completions".to_string(),
        ApiProvider::Google => format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            model
        ),
        ApiProvider::Ollama => "http://localhost:11434/v1/chat/completions".to_string(),
        ApiProvider::Custom { endpoint } => endpoint.clone(),
    }
}

fn no_stops(stops: &&[String]) -> bool {
    stops.is_empty()
}

fn preview(body: &str) -> String {
    body.trim().chars().take(BODY_PREVIEW_CHARS).collect()
}

/// Pull the first text completion out of a response body.
fn extract_text(format: WireFormat, body: &str) -> Result<String> {
    let text = match format {
        WireFormat::ChatCompletions => serde_json::from_str::<ChatResponse>(body)
            .map(|r| r.choices.into_iter().next().and_then(|c| c.message.content)),
        WireFormat::AnthropicMessages => serde_json::from_str::<AnthropicResponse>(body)
            .map(|r| r.content.into_iter().find_map(|block| block.text)),
        WireFormat::GeminiGenerate => serde_json::from_str::<GeminiResponse>(body).map(|r| {
            r.candidates
                .into_iter()
                .next()
                .and_then(|c| c.content.parts.into_iter().next())
                .map(|part| part.text)
        }),
    }
    .with_context(|| format!("Unexpected response shape: {}", preview(body)))?;

    text.ok_or_else(|| anyhow!("Model returned no completion text"))
}

#[async_trait]
impl LLMProvider for ExternalProvider {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let format = WireFormat::of(&self.provider);
        tracing::debug!(
            model = %self.model,
            format = ?format,
            max_tokens = config.max_tokens,
            prompt_chars = prompt.len(),
            "Calling hosted model"
        );

        let body = self.call(self.request(prompt, config)).await?;
        let text = extract_text(format, &body)?;
        tracing::debug!(chars = text.len(), "Model replied");
        Ok(text)
    }

    fn info(&self) -> ProviderInfo {
        let (name, context_window) = match &self.provider {
            ApiProvider::OpenAI => ("OpenAI", 128_000),
            ApiProvider::Anthropic => ("Anthropic", 200_000),
            ApiProvider::Google => ("Google", 1_000_000),
            ApiProvider::OpenRouter => ("OpenRouter", 32_768),
            ApiProvider::Together => ("Together", 32_768),
            ApiProvider::Ollama => ("Ollama", 8_192),
            ApiProvider::Custom { .. } => ("Custom", 32_768),
        };
        ProviderInfo {
            name: name.to_string(),
            model: self.model.clone(),
            context_window,
            is_local: matches!(self.provider, ApiProvider::Ollama),
        }
    }

    async fn is_ready(&self) -> bool {
        matches!(self.provider, ApiProvider::Ollama) || !self.api_key.is_empty()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "no_stops")]
    stop: &'a [String],
    stream: bool,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "no_stops")]
    stop_sequences: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig<'a>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiTextPart<'a>>,
}

impl<'a> GeminiContent<'a> {
    fn text(text: &'a str) -> Self {
        Self {
            parts: vec![GeminiTextPart { text }],
        }
    }
}

#[derive(Serialize)]
struct GeminiTextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig<'a> {
    temperature: f32,
    top_p: f32,
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "no_stops")]
    stop_sequences: &'a [String],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiReplyContent,
}

#[derive(Deserialize)]
struct GeminiReplyContent {
    parts: Vec<GeminiReplyPart>,
}

#[derive(Deserialize)]
struct GeminiReplyPart {
    text: String,
}
