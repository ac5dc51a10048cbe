use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AdvisorError, Result};
use crate::llm::{ApiProvider, LLMConfig, LLMMode};

pub const CONFIG_ENV: &str = "LEXLEAD_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub data_dir: PathBuf,
    pub llm: LLMConfig,
    pub retrieval: RetrievalConfig,
    pub web_search: WebSearchConfig,
    pub workflow: WorkflowLimits,
    pub strategy: StrategyMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Passages handed to the grader per retrieval
    pub k: usize,
    pub corpus_dir: Option<PathBuf>,
    /// Defaults to `<data_dir>/corpus_index`
    pub index_dir: Option<PathBuf>,
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub api_key: Option<String>,
    pub engine: String,
    pub location: Option<String>,
    pub max_results: usize,
}

/// Bounds on a single workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowLimits {
    /// Total node visits, ROUTE included
    pub max_node_visits: usize,
    pub max_rewrites: usize,
    pub max_regenerations: usize,
    pub node_timeout_ms: u64,
    pub run_timeout_ms: u64,
    pub retry_backoff_ms: u64,
}

impl WorkflowLimits {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Which path `Advisor::answer` takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Adaptive RAG workflow for every question
    #[default]
    Workflow,
    /// Classify first, then pick direct LLM, RAG or web search
    Selector,
}

impl std::str::FromStr for StrategyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workflow" => Ok(Self::Workflow),
            "selector" => Ok(Self::Selector),
            other => Err(format!("unknown strategy '{}' (expected workflow or selector)", other)),
        }
    }
}

impl AdvisorConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.retrieval.k == 0 {
            return Err("retrieval.k must be > 0".into());
        }
        if self.retrieval.chunking.chunk_size < 50 {
            return Err("retrieval.chunking.chunk_size must be >= 50".into());
        }
        if self.retrieval.chunking.chunk_overlap >= self.retrieval.chunking.chunk_size {
            return Err("retrieval.chunking.chunk_overlap must be < chunk_size".into());
        }
        if self.web_search.max_results == 0 {
            return Err("web_search.max_results must be > 0".into());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err("llm.temperature must be in [0.0, 2.0]".into());
        }
        if self.llm.max_tokens == 0 {
            return Err("llm.max_tokens must be > 0".into());
        }
        let limits = &self.workflow;
        if limits.max_node_visits == 0 || limits.max_rewrites == 0 || limits.max_regenerations == 0 {
            return Err("workflow loop limits must be > 0".into());
        }
        if limits.node_timeout_ms == 0 || limits.run_timeout_ms == 0 {
            return Err("workflow timeouts must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> std::result::Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// File (explicit path or `LEXLEAD_CONFIG`), then environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        let mut config = match path {
            Some(path) => Self::from_file(&path).map_err(AdvisorError::Config)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()));
        config.validate().map_err(AdvisorError::Config)?;
        tracing::debug!(
            data_dir = %config.data_dir.display(),
            strategy = ?config.strategy,
            "Loaded advisor config"
        );
        Ok(config)
    }

    /// Overlay environment variables, read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("LEXLEAD_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        let provider = lookup("LEXLEAD_PROVIDER").and_then(|name| {
            let parsed = ApiProvider::from_name(&name);
            if parsed.is_none() {
                tracing::warn!(provider = %name, "Unknown LEXLEAD_PROVIDER, ignoring");
            }
            parsed
        });
        let model = lookup("LEXLEAD_MODEL");

        match &mut self.llm.mode {
            LLMMode::External {
                provider: current_provider,
                api_key,
                model: current_model,
            } => {
                if let Some(p) = provider {
                    *current_provider = p;
                }
                if let Some(m) = model {
                    *current_model = m;
                }
                if let Some(key) = lookup(current_provider.api_key_var()) {
                    *api_key = key;
                }
            }
            LLMMode::Disabled => {
                let provider = provider.unwrap_or(ApiProvider::OpenAI);
                let key = lookup(provider.api_key_var());
                if key.is_some() || provider == ApiProvider::Ollama {
                    self.llm.mode = LLMMode::External {
                        model: model.unwrap_or_else(|| provider.default_model().to_string()),
                        api_key: key.unwrap_or_default(),
                        provider,
                    };
                }
            }
        }

        if let Some(key) = lookup("SERPAPI_API_KEY") {
            self.web_search.api_key = Some(key);
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.retrieval
            .index_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("corpus_index"))
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lexlead");

        Self {
            data_dir,
            llm: LLMConfig::default(),
            retrieval: RetrievalConfig::default(),
            web_search: WebSearchConfig::default(),
            workflow: WorkflowLimits::default(),
            strategy: StrategyMode::Workflow,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 12,
            corpus_dir: None,
            index_dir: None,
            chunking: ChunkingConfig::default(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
            min_chunk_size: 80,
        }
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            engine: "google".to_string(),
            location: Some("Illinois, United States".to_string()),
            max_results: 5,
        }
    }
}

impl Default for WorkflowLimits {
    fn default() -> Self {
        Self {
            max_node_visits: 25,
            max_rewrites: 3,
            max_regenerations: 3,
            node_timeout_ms: 60_000,
            run_timeout_ms: 300_000,
            retry_backoff_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AdvisorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.k, 12);
        assert_eq!(config.workflow.max_node_visits, 25);
        assert_eq!(config.strategy, StrategyMode::Workflow);
        assert!(config.index_dir().ends_with("corpus_index"));
    }

    #[test]
    fn test_validation_rejects_broken_values() {
        let mut config = AdvisorConfig::default();
        config.retrieval.k = 0;
        assert!(config.validate().unwrap_err().contains("retrieval.k"));

        let mut config = AdvisorConfig::default();
        config.retrieval.chunking.chunk_overlap = config.retrieval.chunking.chunk_size;
        assert!(config.validate().is_err());

        let mut config = AdvisorConfig::default();
        config.llm.temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = AdvisorConfig::default();
        config.workflow.max_rewrites = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexlead.json");
        std::fs::write(
            &path,
            r#"{"strategy": "selector", "retrieval": {"k": 4}, "workflow": {"max_rewrites": 1}}"#,
        )
        .unwrap();

        let config = AdvisorConfig::from_file(&path).unwrap();
        assert_eq!(config.strategy, StrategyMode::Selector);
        assert_eq!(config.retrieval.k, 4);
        assert_eq!(config.retrieval.chunking.chunk_size, 1500);
        assert_eq!(config.workflow.max_rewrites, 1);
        assert_eq!(config.workflow.max_regenerations, 3);
    }

    #[test]
    fn test_from_file_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"retrieval": {"k": 0}}"#).unwrap();
        assert!(AdvisorConfig::from_file(&path).is_err());
        assert!(AdvisorConfig::from_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_env_enables_external_llm() {
        let mut config = AdvisorConfig::default();
        config.apply_env(env(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("LEXLEAD_MODEL", "gpt-4o"),
            ("SERPAPI_API_KEY", "serp"),
            ("LEXLEAD_DATA_DIR", "/tmp/lexlead"),
        ]));

        match &config.llm.mode {
            LLMMode::External { provider, api_key, model } => {
                assert_eq!(*provider, ApiProvider::OpenAI);
                assert_eq!(api_key, "sk-test");
                assert_eq!(model, "gpt-4o");
            }
            LLMMode::Disabled => panic!("expected external mode"),
        }
        assert_eq!(config.web_search.api_key.as_deref(), Some("serp"));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/lexlead"));
    }

    #[test]
    fn test_env_without_key_keeps_llm_disabled() {
        let mut config = AdvisorConfig::default();
        config.apply_env(env(&[("LEXLEAD_MODEL", "gpt-4o")]));
        assert!(matches!(config.llm.mode, LLMMode::Disabled));
    }

    #[test]
    fn test_env_provider_switch_uses_provider_key() {
        let mut config = AdvisorConfig::default();
        config.apply_env(env(&[
            ("LEXLEAD_PROVIDER", "anthropic"),
            ("ANTHROPIC_API_KEY", "ak"),
        ]));
        match &config.llm.mode {
            LLMMode::External { provider, api_key, model } => {
                assert_eq!(*provider, ApiProvider::Anthropic);
                assert_eq!(api_key, "ak");
                assert_eq!(model, ApiProvider::Anthropic.default_model());
            }
            LLMMode::Disabled => panic!("expected external mode"),
        }
    }

    #[test]
    fn test_strategy_mode_from_str() {
        assert_eq!("Selector".parse::<StrategyMode>().unwrap(), StrategyMode::Selector);
        assert!("graph".parse::<StrategyMode>().is_err());
    }
}
