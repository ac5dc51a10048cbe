//! Adaptive RAG workflow: a small state machine over [`GraphState`].
//!
//! ```text
//! route ─┬─ web_search ─────────────────────────────┐
//!        └─ retrieve ─ grade_documents ─┬─ generate ─┴─ grade_generation ─┬─ END (useful)
//!              ▲                         │      ▲                          ├─ generate (not supported)
//!              └──── transform_query ◄───┘      └──────────────────────────┘
//!                         ▲ (no relevant documents)                        └─ transform_query (not useful)
//! ```
//!
//! [`GraphState`]: crate::state::GraphState

pub mod engine;
pub mod graph;
pub mod nodes;
pub mod outcome;

pub use engine::{AdaptiveRag, AdaptiveRagBuilder};
pub use graph::{DocumentsVerdict, GenerationVerdict, Node, Step, Transition};
pub use outcome::{AnswerOutcome, AnswerResult, RunTrace};

pub use crate::config::WorkflowLimits;
