//! Strategy selection and the [`Advisor`] front door.
//!
//! In `workflow` mode every question goes through [`AdaptiveRag`]. In
//! `selector` mode the question is classified once and sent down one of
//! three paths: the workflow, a plain model answer, or a single
//! web-grounded pass without grading.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::chains::{Judge, LlmJudge, QuestionDifficulty, QuestionEvaluation};
use crate::config::{AdvisorConfig, StrategyMode, WorkflowLimits};
use crate::error::{AdvisorError, Result};
use crate::llm::{GenerationConfig, LLMManager, LLMMode};
use crate::retriever::{CorpusRetriever, Retriever};
use crate::retry::{call_with_retry, RetryPolicy};
use crate::search::{CorpusIndex, SerpApiSearch, WebSearch};
use crate::types::Document;
use crate::workflow::engine::{remaining_budget, run_timeout};
use crate::workflow::{AdaptiveRag, AnswerOutcome, AnswerResult, Node, RunTrace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Full adaptive workflow over the legal corpus
    Rag,
    /// Model answers from its own knowledge
    DirectLlm,
    /// One web search, one grounded answer
    WebSearch,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rag => "rag",
            Self::DirectLlm => "direct_llm",
            Self::WebSearch => "web_search",
        };
        f.write_str(name)
    }
}

/// Illinois questions that retrieval helps go to the corpus; easy questions
/// are answered directly; everything else is searched on the web.
pub fn select_strategy(evaluation: &QuestionEvaluation) -> Strategy {
    if evaluation.is_rag_useful && evaluation.is_illinois_law {
        Strategy::Rag
    } else if evaluation.difficulty == QuestionDifficulty::Easy {
        Strategy::DirectLlm
    } else {
        Strategy::WebSearch
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorResponse {
    pub strategy: Strategy,
    /// Present when the question was classified first
    pub evaluation: Option<QuestionEvaluation>,
    pub result: AnswerResult,
}

pub struct Advisor {
    judge: Arc<dyn Judge>,
    workflow: AdaptiveRag,
    web_search: Option<Arc<dyn WebSearch>>,
    mode: StrategyMode,
    web_results: usize,
    limits: WorkflowLimits,
}

impl Advisor {
    pub fn new(
        judge: Arc<dyn Judge>,
        retriever: Arc<dyn Retriever>,
        web_search: Option<Arc<dyn WebSearch>>,
        config: &AdvisorConfig,
    ) -> Self {
        let mut builder = AdaptiveRag::builder(judge.clone(), retriever)
            .limits(config.workflow.clone())
            .k(config.retrieval.k)
            .web_results(config.web_search.max_results);
        if let Some(search) = &web_search {
            builder = builder.web_search(search.clone());
        }

        Self {
            judge,
            workflow: builder.build(),
            web_search,
            mode: config.strategy,
            web_results: config.web_search.max_results,
            limits: config.workflow.clone(),
        }
    }

    /// Wire the model, corpus index and web search described by `config`.
    pub async fn from_config(config: &AdvisorConfig) -> Result<Self> {
        if matches!(config.llm.mode, LLMMode::Disabled) {
            return Err(AdvisorError::Config(
                "no language model configured; set OPENAI_API_KEY or llm.mode in the config file"
                    .to_string(),
            ));
        }

        let mut manager = LLMManager::new(config.llm.clone());
        manager.initialize().await?;
        let generation = GenerationConfig::from(&config.llm);
        let judge: Arc<dyn Judge> = Arc::new(LlmJudge::new(Arc::new(manager), generation));

        let index_dir = config.index_dir();
        let index = CorpusIndex::open(&index_dir)
            .map_err(|e| AdvisorError::retrieval("corpus", format!("{:#}", e)))?;
        tracing::info!(
            index_dir = %index_dir.display(),
            passages = index.num_passages(),
            "Opened corpus index"
        );
        let retriever: Arc<dyn Retriever> = Arc::new(CorpusRetriever::new(Arc::new(index)));

        let web_search = SerpApiSearch::from_config(&config.web_search)
            .map(|search| Arc::new(search) as Arc<dyn WebSearch>);
        if web_search.is_none() {
            tracing::warn!("SERPAPI_API_KEY not set, web search route will fail");
        }

        Ok(Self::new(judge, retriever, web_search, config))
    }

    pub fn mode(&self) -> StrategyMode {
        self.mode
    }

    pub fn with_mode(mut self, mode: StrategyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn workflow(&self) -> &AdaptiveRag {
        &self.workflow
    }

    pub async fn answer(&self, question: &str) -> Result<AdvisorResponse> {
        self.answer_with_cancel(question, CancellationToken::new()).await
    }

    pub async fn answer_with_cancel(
        &self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<AdvisorResponse> {
        let started = Instant::now();
        if self.mode == StrategyMode::Workflow {
            let result = self.workflow.run_since(question, cancel, started).await?;
            return Ok(AdvisorResponse {
                strategy: Strategy::Rag,
                evaluation: None,
                result,
            });
        }

        let evaluation = self.bounded(&cancel, started, self.evaluate(question)).await?;
        let strategy = select_strategy(&evaluation);
        tracing::info!(strategy = %strategy, "Selected strategy");

        let result = match strategy {
            Strategy::Rag => self.workflow.run_since(question, cancel, started).await?,
            Strategy::DirectLlm => {
                self.bounded(&cancel, started, self.direct_pass(question)).await?
            }
            Strategy::WebSearch => self.bounded(&cancel, started, self.web_pass(question)).await?,
        };

        Ok(AdvisorResponse {
            strategy,
            evaluation: Some(evaluation),
            result,
        })
    }

    pub async fn evaluate(&self, question: &str) -> Result<QuestionEvaluation> {
        call_with_retry("evaluate_question", self.retry_policy(), || {
            self.judge.evaluate_question(question)
        })
        .await
    }

    async fn direct_pass(&self, question: &str) -> Result<AnswerResult> {
        let mut trace = RunTrace::start(question);
        trace.enter(Node::Generate);
        let answer = call_with_retry("answer_directly", self.retry_policy(), || {
            self.judge.answer_directly(question)
        })
        .await?;
        trace.finish();

        Ok(AnswerResult {
            question: question.to_string(),
            final_question: question.to_string(),
            outcome: AnswerOutcome::Direct { answer },
            documents: Vec::new(),
            trace,
        })
    }

    async fn web_pass(&self, question: &str) -> Result<AnswerResult> {
        let search = self.web_search.as_deref().ok_or_else(|| {
            AdvisorError::retrieval("web_search", "no web search backend configured")
        })?;

        let mut trace = RunTrace::start(question);
        trace.enter(Node::WebSearch);
        let results = search.search(question, self.web_results).await?;
        let documents: Vec<Document> = results.iter().map(|r| r.to_document()).collect();
        tracing::debug!(results = documents.len(), "Web search for grounded answer");

        trace.enter(Node::Generate);
        let answer = call_with_retry("answer_from_web", self.retry_policy(), || {
            self.judge.answer_from_web(question, &documents)
        })
        .await?;
        trace.finish();

        Ok(AnswerResult {
            question: question.to_string(),
            final_question: question.to_string(),
            outcome: AnswerOutcome::Direct { answer },
            documents: documents.iter().map(Document::reference).collect(),
            trace,
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_limits(&self.limits)
    }

    /// Cancellation and whatever is left of the run budget that began at
    /// `started`.
    async fn bounded<T>(
        &self,
        cancel: &CancellationToken,
        started: Instant,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        if cancel.is_cancelled() {
            return Err(AdvisorError::Cancelled);
        }
        let remaining = remaining_budget(&self.limits, started)?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AdvisorError::Cancelled),
            result = tokio::time::timeout(remaining, work) => {
                result.unwrap_or_else(|_| Err(run_timeout(started)))
            }
        }
    }
}
