//! Judgment chains: stateless wrappers that turn one prompt template and one
//! model call into one typed decision.
//!
//! Structured chains append a JSON schema for their output type and parse the
//! reply strictly. Output that does not fit the schema is a
//! [`SchemaValidation`](crate::error::AdvisorError::SchemaValidation) error,
//! never a default value.

pub mod evaluator;
pub mod generator;
pub mod grading;
pub mod judge;
pub mod prompt;
pub mod rewriter;
pub mod router;
pub mod structured;

pub use evaluator::{QuestionCategory, QuestionDifficulty, QuestionEvaluation, QuestionEvaluator};
pub use generator::{DirectAnswerer, Generator, WebAnswerer};
pub use grading::{AnswerUsefulnessGrader, DocumentRelevanceGrader, HallucinationGrader};
pub use judge::{Judge, LlmJudge};
pub use prompt::{PromptTemplate, RenderedPrompt};
pub use rewriter::QuestionRewriter;
pub use router::{DataSource, QuestionRouter, RouteQuery};
pub use structured::{BinaryGrade, BinaryScore, StructuredChain, TextChain};
