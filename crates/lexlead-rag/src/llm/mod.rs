//! LLM Module - external language model support
//! The advisor talks to hosted chat models only; every judgment and answer
//! goes through [`LLMProvider::generate`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod external;

pub use external::ExternalProvider;

/// LLM operation mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LLMMode {
    /// External API provider
    External {
        provider: ApiProvider,
        api_key: String,
        model: String,
    },
    /// LLM disabled; only `index` works in this mode
    Disabled,
}

/// External API providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiProvider {
    OpenAI,
    Anthropic,
    OpenRouter,
    Together,
    Google,
    Ollama,
    Custom { endpoint: String },
}

impl ApiProvider {
    /// Parse the short provider names accepted in `LEXLEAD_PROVIDER`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "anthropic" => Some(Self::Anthropic),
            "openrouter" => Some(Self::OpenRouter),
            "together" => Some(Self::Together),
            "google" | "gemini" => Some(Self::Google),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAI => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
            Self::OpenRouter => "openai/gpt-4o-mini",
            Self::Together => "meta-llama/Llama-3.3-70B-Instruct-Turbo",
            Self::Google => "gemini-1.5-flash",
            Self::Ollama => "llama3.1",
            Self::Custom { .. } => "default",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Google => "GOOGLE_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::Together => "TOGETHER_API_KEY",
            Self::OpenAI | Self::Ollama | Self::Custom { .. } => "OPENAI_API_KEY",
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub mode: LLMMode,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub system_prompt: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            mode: LLMMode::Disabled,
            max_tokens: 2048,
            temperature: 0.0,
            top_p: 0.95,
            system_prompt: None,
        }
    }
}

/// Core trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// Get model info
    fn info(&self) -> ProviderInfo;

    /// Check if provider is ready
    async fn is_ready(&self) -> bool;
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    /// Sent as the system message when the provider supports one
    pub system_prompt: Option<String>,
    pub stop_sequences: Vec<String>,
}

impl From<&LLMConfig> for GenerationConfig {
    fn from(config: &LLMConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            system_prompt: config.system_prompt.clone(),
            stop_sequences: vec![],
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from(&LLMConfig::default())
    }
}

/// Provider information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub context_window: usize,
    pub is_local: bool,
}

/// LLM Manager - owns the configured provider
pub struct LLMManager {
    config: LLMConfig,
    provider: Option<Arc<dyn LLMProvider>>,
}

impl LLMManager {
    /// Create new LLM manager
    pub fn new(config: LLMConfig) -> Self {
        Self {
            config,
            provider: None,
        }
    }

    /// Create a manager around an already-built provider
    pub fn with_provider(config: LLMConfig, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            config,
            provider: Some(provider),
        }
    }

    /// Initialize the provider described by the config
    pub async fn initialize(&mut self) -> Result<()> {
        match &self.config.mode {
            LLMMode::External {
                provider,
                api_key,
                model,
            } => {
                let provider =
                    ExternalProvider::new(provider.clone(), api_key.clone(), model.clone())?;
                self.provider = Some(Arc::new(provider));
                Ok(())
            }
            LLMMode::Disabled => {
                self.provider = None;
                Ok(())
            }
        }
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    /// Generate completion with custom max_tokens and temperature
    pub async fn generate_custom(
        &self,
        prompt: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String> {
        let mut config = GenerationConfig::from(&self.config);
        config.max_tokens = max_tokens;
        config.temperature = temperature;
        self.provider()?.generate(prompt, &config).await
    }

    fn provider(&self) -> Result<&Arc<dyn LLMProvider>> {
        self.provider
            .as_ref()
            .ok_or_else(|| anyhow!("LLM is disabled or not initialized"))
    }
}

#[async_trait]
impl LLMProvider for LLMManager {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let mut config = config.clone();
        if config.system_prompt.is_none() {
            config.system_prompt = self.config.system_prompt.clone();
        }
        self.provider()?.generate(prompt, &config).await
    }

    fn info(&self) -> ProviderInfo {
        match &self.provider {
            Some(provider) => provider.info(),
            None => ProviderInfo {
                name: "disabled".to_string(),
                model: String::new(),
                context_window: 0,
                is_local: false,
            },
        }
    }

    async fn is_ready(&self) -> bool {
        match &self.provider {
            Some(provider) => provider.is_ready().await,
            None => false,
        }
    }
}

/// Render passages as numbered `[Document N]` blocks.
pub fn format_context(passages: &[String]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, passage)| format!("[Document {}]\n{}", i + 1, passage.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
