use std::sync::Arc;

use async_trait::async_trait;

use super::evaluator::{QuestionEvaluation, QuestionEvaluator};
use super::generator::{DirectAnswerer, Generator, WebAnswerer};
use super::grading::{AnswerUsefulnessGrader, DocumentRelevanceGrader, HallucinationGrader};
use super::rewriter::QuestionRewriter;
use super::router::{DataSource, QuestionRouter};
use super::structured::BinaryScore;
use crate::error::Result;
use crate::llm::{GenerationConfig, LLMProvider};
use crate::types::Document;

/// Every model-backed decision the advisor makes.
///
/// The workflow and the strategy selector depend on this trait only, so a
/// scripted implementation can drive them deterministically.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn route_question(&self, question: &str) -> Result<DataSource>;

    async fn grade_document(&self, question: &str, document: &Document) -> Result<BinaryScore>;

    /// Is `generation` supported by `documents`?
    async fn grade_hallucination(&self, documents: &[Document], generation: &str) -> Result<BinaryScore>;

    /// Does `generation` resolve `question`?
    async fn grade_answer(&self, question: &str, generation: &str) -> Result<BinaryScore>;

    async fn rewrite_question(&self, question: &str) -> Result<String>;

    async fn generate(&self, question: &str, documents: &[Document]) -> Result<String>;

    async fn evaluate_question(&self, question: &str) -> Result<QuestionEvaluation>;

    async fn answer_directly(&self, question: &str) -> Result<String>;

    async fn answer_from_web(&self, question: &str, results: &[Document]) -> Result<String>;
}

/// [`Judge`] backed by the language-model chains.
pub struct LlmJudge {
    router: QuestionRouter,
    document_grader: DocumentRelevanceGrader,
    hallucination_grader: HallucinationGrader,
    answer_grader: AnswerUsefulnessGrader,
    rewriter: QuestionRewriter,
    generator: Generator,
    evaluator: QuestionEvaluator,
    direct: DirectAnswerer,
    web: WebAnswerer,
}

impl LlmJudge {
    /// `generation` applies to the answer-producing chains; judgments always
    /// run at temperature 0 with a small token budget.
    pub fn new(llm: Arc<dyn LLMProvider>, generation: GenerationConfig) -> Self {
        Self {
            router: QuestionRouter::new(llm.clone()),
            document_grader: DocumentRelevanceGrader::new(llm.clone()),
            hallucination_grader: HallucinationGrader::new(llm.clone()),
            answer_grader: AnswerUsefulnessGrader::new(llm.clone()),
            rewriter: QuestionRewriter::new(llm.clone()),
            generator: Generator::new(llm.clone(), generation.clone()),
            evaluator: QuestionEvaluator::new(llm.clone()),
            direct: DirectAnswerer::new(llm.clone(), generation.clone()),
            web: WebAnswerer::new(llm, generation),
        }
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn route_question(&self, question: &str) -> Result<DataSource> {
        self.router.invoke(question).await
    }

    async fn grade_document(&self, question: &str, document: &Document) -> Result<BinaryScore> {
        self.document_grader.invoke(question, document).await
    }

    async fn grade_hallucination(&self, documents: &[Document], generation: &str) -> Result<BinaryScore> {
        self.hallucination_grader.invoke(documents, generation).await
    }

    async fn grade_answer(&self, question: &str, generation: &str) -> Result<BinaryScore> {
        self.answer_grader.invoke(question, generation).await
    }

    async fn rewrite_question(&self, question: &str) -> Result<String> {
        self.rewriter.invoke(question).await
    }

    async fn generate(&self, question: &str, documents: &[Document]) -> Result<String> {
        self.generator.invoke(question, documents).await
    }

    async fn evaluate_question(&self, question: &str) -> Result<QuestionEvaluation> {
        self.evaluator.invoke(question).await
    }

    async fn answer_directly(&self, question: &str) -> Result<String> {
        self.direct.invoke(question).await
    }

    async fn answer_from_web(&self, question: &str, results: &[Document]) -> Result<String> {
        self.web.invoke(question, results).await
    }
}
