//! LexLead: adaptive retrieval-augmented answering for Illinois legal questions.
//!
//! A question is routed to the legal corpus or the web, the retrieved
//! passages are graded for relevance, and every generated answer is checked
//! for groundedness and usefulness before it is returned. Failed checks loop
//! back to regeneration or to a rewritten question, within fixed bounds.

pub mod chains;
pub mod config;
pub mod error;
pub mod llm;
pub mod processing;
pub mod retriever;
pub mod retry;
pub mod search;
pub mod state;
pub mod strategy;
pub mod testing;
pub mod types;
pub mod workflow;

pub use chains::{DataSource, Judge, LlmJudge, QuestionEvaluation};
pub use config::{AdvisorConfig, StrategyMode, WorkflowLimits};
pub use error::{AdvisorError, Result};
pub use retriever::{CorpusRetriever, Retriever};
pub use state::GraphState;
pub use strategy::{select_strategy, Advisor, AdvisorResponse, Strategy};
pub use types::{Document, DocumentRef};
pub use workflow::{AdaptiveRag, AnswerOutcome, AnswerResult, RunTrace};

// Re-export LLM types
pub use llm::{ApiProvider, GenerationConfig, LLMConfig, LLMManager, LLMMode, LLMProvider};

pub use uuid::Uuid;
