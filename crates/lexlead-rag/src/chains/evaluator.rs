use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::prompt::EVALUATE_QUESTION;
use super::structured::StructuredChain;
use crate::error::Result;
use crate::llm::LLMProvider;

/// Kind of legal reasoning a question calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionCategory {
    IssueSpotting,
    RuleRecall,
    RuleApplication,
    RuleConclusion,
    Interpretation,
    RhetoricalUnderstanding,
    OutOfScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionDifficulty {
    #[serde(alias = "Easy")]
    Easy,
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "Hard")]
    Hard,
}

/// One-shot classification that drives strategy selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionEvaluation {
    /// The category of legal reasoning the question requires.
    pub category: QuestionCategory,
    /// Whether retrieving Illinois legal sources would help answer the question.
    pub is_rag_useful: bool,
    /// How hard the question is to answer: easy, medium or hard.
    #[serde(alias = "difficulty_response")]
    pub difficulty: QuestionDifficulty,
    /// One or two sentences explaining the difficulty rating.
    #[serde(alias = "reasoning_about_difficulty")]
    pub reasoning: String,
    /// Whether the question concerns Illinois law.
    pub is_illinois_law: bool,
}

pub struct QuestionEvaluator {
    chain: StructuredChain<QuestionEvaluation>,
}

impl QuestionEvaluator {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            chain: StructuredChain::new(llm, EVALUATE_QUESTION),
        }
    }

    pub async fn invoke(&self, question: &str) -> Result<QuestionEvaluation> {
        let evaluation = self.chain.invoke(&[("question", question)]).await?;
        tracing::info!(
            category = ?evaluation.category,
            difficulty = ?evaluation.difficulty,
            is_rag_useful = evaluation.is_rag_useful,
            is_illinois_law = evaluation.is_illinois_law,
            "Evaluated question"
        );
        Ok(evaluation)
    }
}
