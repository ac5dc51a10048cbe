//! Deterministic stand-ins for the model, the retriever and web search.
//!
//! Used by the unit tests and the scenario tests under `tests/`, and handy
//! for dry runs of the workflow without network access.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chains::{
    BinaryScore, DataSource, Judge, QuestionCategory, QuestionDifficulty, QuestionEvaluation,
};
use crate::error::{AdvisorError, Result};
use crate::llm::{GenerationConfig, LLMProvider, ProviderInfo};
use crate::retriever::Retriever;
use crate::search::{WebResult, WebSearch};
use crate::types::Document;

/// One recorded [`MockLlm`] call.
#[derive(Debug, Clone)]
pub struct MockLlmCall {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
}

/// Replies by substring match on the system prompt plus the prompt.
#[derive(Default)]
pub struct MockLlm {
    rules: Vec<(String, String)>,
    default: Option<String>,
    calls: Mutex<Vec<MockLlmCall>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `response` when `needle` appears anywhere in the request.
    /// Rules are tried in insertion order.
    pub fn when(mut self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push((needle.into(), response.into()));
        self
    }

    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.default = Some(response.into());
        self
    }

    pub fn calls(&self) -> Vec<MockLlmCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LLMProvider for MockLlm {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> anyhow::Result<String> {
        self.calls.lock().push(MockLlmCall {
            prompt: prompt.to_string(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        });

        let haystack = format!("{}\n{}", config.system_prompt.as_deref().unwrap_or(""), prompt);
        self.rules
            .iter()
            .find(|(needle, _)| haystack.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .or_else(|| self.default.clone())
            .ok_or_else(|| anyhow!("mock model has no response for this prompt"))
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "mock".to_string(),
            model: "mock".to_string(),
            context_window: 8192,
            is_local: true,
        }
    }

    async fn is_ready(&self) -> bool {
        true
    }
}

/// A [`Judge`] call as seen by [`ScriptedJudge`].
#[derive(Debug, Clone, PartialEq)]
pub enum JudgeCall {
    RouteQuestion { question: String },
    GradeDocument { question: String, document: String },
    GradeHallucination { documents: usize, generation: String },
    GradeAnswer { question: String, generation: String },
    RewriteQuestion { question: String },
    Generate { question: String, documents: Vec<String> },
    EvaluateQuestion { question: String },
    AnswerDirectly { question: String },
    AnswerFromWeb { question: String, results: usize },
}

impl JudgeCall {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RouteQuestion { .. } => "route_question",
            Self::GradeDocument { .. } => "grade_document",
            Self::GradeHallucination { .. } => "grade_hallucination",
            Self::GradeAnswer { .. } => "grade_answer",
            Self::RewriteQuestion { .. } => "rewrite_question",
            Self::Generate { .. } => "generate",
            Self::EvaluateQuestion { .. } => "evaluate_question",
            Self::AnswerDirectly { .. } => "answer_directly",
            Self::AnswerFromWeb { .. } => "answer_from_web",
        }
    }
}

type DocumentPredicate = Box<dyn Fn(&str, &Document) -> bool + Send + Sync>;

/// Scripted decisions, consumed in order.
///
/// Every queue falls back to a permissive default once drained: routes go to
/// the corpus, documents and generations pass their grades, rewrites append
/// `" (rewritten)"`, and the n-th generation is `"Answer n: <question>"`.
/// The route queue repeats its last entry so routing stays stable.
#[derive(Default)]
pub struct ScriptedJudge {
    routes: Mutex<VecDeque<DataSource>>,
    last_route: Mutex<Option<DataSource>>,
    document_grader: Option<DocumentPredicate>,
    hallucination_grades: Mutex<VecDeque<BinaryScore>>,
    answer_grades: Mutex<VecDeque<BinaryScore>>,
    rewrites: Mutex<VecDeque<String>>,
    generations: Mutex<VecDeque<String>>,
    evaluation: Option<QuestionEvaluation>,
    schema_failures: Mutex<HashMap<&'static str, usize>>,
    delays: HashMap<&'static str, Duration>,
    calls: Mutex<Vec<JudgeCall>>,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(self, routes: impl IntoIterator<Item = DataSource>) -> Self {
        self.routes.lock().extend(routes);
        self
    }

    pub fn grade_documents_by<F>(mut self, grader: F) -> Self
    where
        F: Fn(&str, &Document) -> bool + Send + Sync + 'static,
    {
        self.document_grader = Some(Box::new(grader));
        self
    }

    pub fn with_hallucination_grades(self, grades: impl IntoIterator<Item = BinaryScore>) -> Self {
        self.hallucination_grades.lock().extend(grades);
        self
    }

    pub fn with_answer_grades(self, grades: impl IntoIterator<Item = BinaryScore>) -> Self {
        self.answer_grades.lock().extend(grades);
        self
    }

    pub fn with_rewrites<S: Into<String>>(self, rewrites: impl IntoIterator<Item = S>) -> Self {
        self.rewrites.lock().extend(rewrites.into_iter().map(Into::into));
        self
    }

    pub fn with_generations<S: Into<String>>(self, generations: impl IntoIterator<Item = S>) -> Self {
        self.generations
            .lock()
            .extend(generations.into_iter().map(Into::into));
        self
    }

    pub fn with_evaluation(mut self, evaluation: QuestionEvaluation) -> Self {
        self.evaluation = Some(evaluation);
        self
    }

    /// The first `times` calls of `kind` fail schema validation.
    pub fn fail_with_schema(self, kind: &'static str, times: usize) -> Self {
        self.schema_failures.lock().insert(kind, times);
        self
    }

    /// Every call of `kind` sleeps for `delay` before answering.
    pub fn with_delay(mut self, kind: &'static str, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    pub fn calls(&self) -> Vec<JudgeCall> {
        self.calls.lock().clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&JudgeCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    async fn enter(&self, call: JudgeCall) -> Result<()> {
        let kind = call.kind();
        self.calls.lock().push(call);

        if let Some(delay) = self.delays.get(kind) {
            tokio::time::sleep(*delay).await;
        }

        let mut failures = self.schema_failures.lock();
        match failures.get_mut(kind) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(AdvisorError::schema(kind, "scripted schema failure", "{}"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    async fn route_question(&self, question: &str) -> Result<DataSource> {
        self.enter(JudgeCall::RouteQuestion {
            question: question.to_string(),
        })
        .await?;

        let next = self.routes.lock().pop_front();
        let mut last = self.last_route.lock();
        let route = next.or(*last).unwrap_or(DataSource::Vectorstore);
        *last = Some(route);
        Ok(route)
    }

    async fn grade_document(&self, question: &str, document: &Document) -> Result<BinaryScore> {
        self.enter(JudgeCall::GradeDocument {
            question: question.to_string(),
            document: document.text.clone(),
        })
        .await?;

        let relevant = self
            .document_grader
            .as_ref()
            .map_or(true, |grader| grader(question, document));
        Ok(if relevant { BinaryScore::Yes } else { BinaryScore::No })
    }

    async fn grade_hallucination(&self, documents: &[Document], generation: &str) -> Result<BinaryScore> {
        self.enter(JudgeCall::GradeHallucination {
            documents: documents.len(),
            generation: generation.to_string(),
        })
        .await?;
        Ok(self
            .hallucination_grades
            .lock()
            .pop_front()
            .unwrap_or(BinaryScore::Yes))
    }

    async fn grade_answer(&self, question: &str, generation: &str) -> Result<BinaryScore> {
        self.enter(JudgeCall::GradeAnswer {
            question: question.to_string(),
            generation: generation.to_string(),
        })
        .await?;
        Ok(self.answer_grades.lock().pop_front().unwrap_or(BinaryScore::Yes))
    }

    async fn rewrite_question(&self, question: &str) -> Result<String> {
        self.enter(JudgeCall::RewriteQuestion {
            question: question.to_string(),
        })
        .await?;
        Ok(self
            .rewrites
            .lock()
            .pop_front()
            .unwrap_or_else(|| format!("{} (rewritten)", question)))
    }

    async fn generate(&self, question: &str, documents: &[Document]) -> Result<String> {
        self.enter(JudgeCall::Generate {
            question: question.to_string(),
            documents: documents.iter().map(|d| d.text.clone()).collect(),
        })
        .await?;

        if let Some(scripted) = self.generations.lock().pop_front() {
            return Ok(scripted);
        }
        let n = self.count_calls(|c| matches!(c, JudgeCall::Generate { .. }));
        Ok(format!("Answer {}: {}", n, question))
    }

    async fn evaluate_question(&self, question: &str) -> Result<QuestionEvaluation> {
        self.enter(JudgeCall::EvaluateQuestion {
            question: question.to_string(),
        })
        .await?;
        Ok(self.evaluation.clone().unwrap_or(QuestionEvaluation {
            category: QuestionCategory::RuleRecall,
            is_rag_useful: true,
            difficulty: QuestionDifficulty::Medium,
            reasoning: "scripted".to_string(),
            is_illinois_law: true,
        }))
    }

    async fn answer_directly(&self, question: &str) -> Result<String> {
        self.enter(JudgeCall::AnswerDirectly {
            question: question.to_string(),
        })
        .await?;
        Ok(format!("Direct answer: {}", question))
    }

    async fn answer_from_web(&self, question: &str, results: &[Document]) -> Result<String> {
        self.enter(JudgeCall::AnswerFromWeb {
            question: question.to_string(),
            results: results.len(),
        })
        .await?;
        Ok(format!("Web answer: {}", question))
    }
}

/// Serves fixed result sets in order; the last set repeats.
pub struct StaticRetriever {
    results: Mutex<VecDeque<Vec<Document>>>,
    last: Mutex<Vec<Document>>,
    failing: bool,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self::sequence(vec![documents])
    }

    pub fn sequence(results: Vec<Vec<Document>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            last: Mutex::new(Vec::new()),
            failing: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with [`AdvisorError::RetrievalUnavailable`].
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::sequence(Vec::new())
        }
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.queries.lock().push((query.to_string(), k));
        if self.failing {
            return Err(AdvisorError::retrieval("corpus", "index unavailable"));
        }

        let mut last = self.last.lock();
        if let Some(next) = self.results.lock().pop_front() {
            *last = next;
        }
        Ok(last.iter().take(k).cloned().collect())
    }
}

/// Canned web search results.
#[derive(Default)]
pub struct MockWebSearch {
    results: Vec<WebResult>,
    failing: bool,
    calls: Mutex<Vec<String>>,
}

impl MockWebSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, results: Vec<WebResult>) -> Self {
        self.results = results;
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>> {
        self.calls.lock().push(query.to_string());
        if self.failing {
            return Err(AdvisorError::retrieval("web_search", "search backend unreachable"));
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }
}
