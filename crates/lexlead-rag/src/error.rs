//! Typed errors for the advisor core.
//!
//! Provider and index internals work with `anyhow`. Anything that crosses a
//! capability boundary (model, retriever, web search) is mapped onto
//! [`AdvisorError`] so the workflow can tell a retryable fault from a run
//! failure.

use thiserror::Error;

/// Longest slice of raw model output kept inside an error.
const RAW_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum AdvisorError {
    /// Model output could not be parsed into the judgment's schema
    #[error("schema validation failed for '{template}': {reason}")]
    SchemaValidation {
        template: String,
        reason: String,
        raw: String,
    },

    /// Retriever or web search backend unreachable
    #[error("retrieval unavailable ({source_name}): {reason}")]
    RetrievalUnavailable { source_name: String, reason: String },

    /// A single node invocation exceeded its deadline
    #[error("{node} timed out after {timeout_ms}ms")]
    CapabilityTimeout { node: String, timeout_ms: u64 },

    /// The run as a whole exceeded its time budget
    #[error("run exceeded its time budget after {elapsed_ms}ms")]
    RunTimeout { elapsed_ms: u64 },

    /// A corrective loop hit its configured bound
    #[error("loop bound exceeded: {bound} reached limit {limit}")]
    LoopBoundExceeded { bound: &'static str, limit: usize },

    #[error("run cancelled")]
    Cancelled,

    /// Provider failure (network, auth, HTTP status)
    #[error("language model error: {0}")]
    Llm(String),

    #[error("prompt template '{template}' has no value for field '{field}'")]
    Template {
        template: &'static str,
        field: String,
    },

    /// Programming error in the workflow wiring
    #[error("invalid workflow state: {0}")]
    InvalidState(String),

    #[error("config error: {0}")]
    Config(String),
}

impl AdvisorError {
    pub fn schema(template: &str, reason: impl Into<String>, raw: &str) -> Self {
        Self::SchemaValidation {
            template: template.to_string(),
            reason: reason.into(),
            raw: raw.chars().take(RAW_PREVIEW_CHARS).collect(),
        }
    }

    pub fn retrieval(source_name: &str, reason: impl std::fmt::Display) -> Self {
        Self::RetrievalUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Transient faults that earn one bounded retry inside the node.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SchemaValidation { .. } | Self::CapabilityTimeout { .. }
        )
    }
}

impl From<anyhow::Error> for AdvisorError {
    fn from(err: anyhow::Error) -> Self {
        Self::Llm(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, AdvisorError>;
