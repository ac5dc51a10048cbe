use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::graph::{GenerationVerdict, Node, Step, Transition};
use super::nodes::{self, NodeOutput};
use super::outcome::{AnswerOutcome, AnswerResult, RunTrace};
use crate::chains::Judge;
use crate::config::WorkflowLimits;
use crate::error::{AdvisorError, Result};
use crate::retriever::Retriever;
use crate::retry::{call_with_retry, RetryPolicy};
use crate::search::WebSearch;
use crate::state::{GraphState, StateUpdate};

const DEFAULT_K: usize = 12;
const DEFAULT_WEB_RESULTS: usize = 5;

/// The adaptive retrieval-and-generation workflow.
///
/// Routes a question to the corpus or the web, grades what comes back,
/// rewrites the question when nothing relevant was found, and grades each
/// generation for groundedness and usefulness before returning it. Both
/// corrective loops are bounded by [`WorkflowLimits`].
pub struct AdaptiveRag {
    judge: Arc<dyn Judge>,
    retriever: Arc<dyn Retriever>,
    web_search: Option<Arc<dyn WebSearch>>,
    limits: WorkflowLimits,
    k: usize,
    web_results: usize,
}

pub struct AdaptiveRagBuilder {
    judge: Arc<dyn Judge>,
    retriever: Arc<dyn Retriever>,
    web_search: Option<Arc<dyn WebSearch>>,
    limits: WorkflowLimits,
    k: usize,
    web_results: usize,
}

impl AdaptiveRagBuilder {
    pub fn web_search(mut self, web_search: Arc<dyn WebSearch>) -> Self {
        self.web_search = Some(web_search);
        self
    }

    pub fn limits(mut self, limits: WorkflowLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Passages requested per retrieval
    pub fn k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn web_results(mut self, web_results: usize) -> Self {
        self.web_results = web_results.max(1);
        self
    }

    pub fn build(self) -> AdaptiveRag {
        AdaptiveRag {
            judge: self.judge,
            retriever: self.retriever,
            web_search: self.web_search,
            limits: self.limits,
            k: self.k,
            web_results: self.web_results,
        }
    }
}

/// Why a run stopped early.
enum Halt {
    Bound(AdvisorError),
    Failed(AdvisorError),
}

impl From<AdvisorError> for Halt {
    fn from(err: AdvisorError) -> Self {
        Self::Failed(err)
    }
}

impl AdaptiveRag {
    pub fn builder(judge: Arc<dyn Judge>, retriever: Arc<dyn Retriever>) -> AdaptiveRagBuilder {
        AdaptiveRagBuilder {
            judge,
            retriever,
            web_search: None,
            limits: WorkflowLimits::default(),
            k: DEFAULT_K,
            web_results: DEFAULT_WEB_RESULTS,
        }
    }

    pub fn limits(&self) -> &WorkflowLimits {
        &self.limits
    }

    pub async fn run(&self, question: &str) -> Result<AnswerResult> {
        self.run_with_cancel(question, CancellationToken::new()).await
    }

    /// Run one question to a terminal state.
    ///
    /// Loop-bound exhaustion resolves to [`AnswerOutcome::Unverified`] or
    /// [`AnswerOutcome::NoAnswer`]. Everything else that stops the run
    /// (retrieval down, repeated schema failures, timeouts, cancellation) is
    /// returned as an error.
    pub async fn run_with_cancel(
        &self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<AnswerResult> {
        self.run_since(question, cancel, Instant::now()).await
    }

    /// Like [`run_with_cancel`](Self::run_with_cancel), but the run-level
    /// budget is measured from `started` so work done before the workflow
    /// (such as question classification) counts against it.
    pub(crate) async fn run_since(
        &self,
        question: &str,
        cancel: CancellationToken,
        started: Instant,
    ) -> Result<AnswerResult> {
        let mut state = GraphState::new(question);
        let mut trace = RunTrace::start(question);
        let span = tracing::info_span!("workflow", run_id = %trace.run_id);

        let halt = self
            .drive(&mut state, &mut trace, &cancel, started)
            .instrument(span.clone())
            .await;
        trace.finish();

        let _entered = span.enter();
        let outcome = match halt {
            Ok(answer) => {
                tracing::info!(
                    visits = trace.visits(),
                    rewrites = trace.rewrites,
                    regenerations = trace.regenerations,
                    elapsed_ms = trace.elapsed_ms,
                    "Workflow finished with verified answer"
                );
                AnswerOutcome::Verified { answer }
            }
            Err(Halt::Bound(bound)) => {
                let reason = bound.to_string();
                tracing::warn!(reason = %reason, visits = trace.visits(), "Workflow stopped at loop bound");
                match state.generation.clone() {
                    Some(answer) => AnswerOutcome::Unverified { answer, reason },
                    None => AnswerOutcome::NoAnswer {
                        reason: format!("could not find relevant information ({})", reason),
                    },
                }
            }
            Err(Halt::Failed(err)) => {
                tracing::error!(error = %err, visits = trace.visits(), "Workflow failed");
                return Err(err);
            }
        };

        Ok(AnswerResult {
            question: question.to_string(),
            final_question: state.question.clone(),
            outcome,
            documents: state.documents.iter().map(|d| d.reference()).collect(),
            trace,
        })
    }

    async fn drive(
        &self,
        state: &mut GraphState,
        trace: &mut RunTrace,
        cancel: &CancellationToken,
        started: Instant,
    ) -> std::result::Result<String, Halt> {
        let retry = RetryPolicy::from_limits(&self.limits);
        let mut node = Node::Route;

        loop {
            if cancel.is_cancelled() {
                return Err(AdvisorError::Cancelled.into());
            }
            if trace.visits() >= self.limits.max_node_visits {
                return Err(Halt::Bound(AdvisorError::LoopBoundExceeded {
                    bound: "node visits",
                    limit: self.limits.max_node_visits,
                }));
            }
            let remaining = remaining_budget(&self.limits, started)?;

            trace.enter(node);
            tracing::debug!(node = %node, visit = trace.visits(), "Entering node");

            let current = &*state;
            let output: NodeOutput = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AdvisorError::Cancelled),
                result = tokio::time::timeout(
                    remaining,
                    call_with_retry(node.as_str(), retry, || self.execute(node, current)),
                ) => result.unwrap_or_else(|_| Err(run_timeout(started))),
            }?;

            tracing::debug!(node = %node, step = ?output.step, "Leaving node");

            if let StateUpdate::Question(rewritten) = &output.update {
                trace.questions.push(rewritten.clone());
            }
            state.apply(output.update);

            match output.step.next() {
                Transition::End => {
                    let answer = state.generation()?.to_string();
                    return Ok(answer);
                }
                Transition::To(next) => {
                    if next == Node::TransformQuery {
                        if trace.rewrites >= self.limits.max_rewrites {
                            return Err(Halt::Bound(AdvisorError::LoopBoundExceeded {
                                bound: "query rewrites",
                                limit: self.limits.max_rewrites,
                            }));
                        }
                        trace.rewrites += 1;
                    }
                    if output.step == Step::GenerationGraded(GenerationVerdict::NotSupported) {
                        if trace.regenerations >= self.limits.max_regenerations {
                            return Err(Halt::Bound(AdvisorError::LoopBoundExceeded {
                                bound: "regenerations",
                                limit: self.limits.max_regenerations,
                            }));
                        }
                        trace.regenerations += 1;
                    }
                    node = next;
                }
            }
        }
    }

    async fn execute(&self, node: Node, state: &GraphState) -> Result<NodeOutput> {
        match node {
            Node::Route => nodes::route(self.judge.as_ref(), state).await,
            Node::WebSearch => {
                nodes::web_search(self.web_search.as_deref(), self.web_results, state).await
            }
            Node::Retrieve => nodes::retrieve(self.retriever.as_ref(), self.k, state).await,
            Node::GradeDocuments => nodes::grade_documents(self.judge.as_ref(), state).await,
            Node::TransformQuery => nodes::transform_query(self.judge.as_ref(), state).await,
            Node::Generate => nodes::generate(self.judge.as_ref(), state).await,
            Node::GradeGeneration => nodes::grade_generation(self.judge.as_ref(), state).await,
        }
    }
}

/// Time left of the run-level budget that began at `started`.
pub(crate) fn remaining_budget(limits: &WorkflowLimits, started: Instant) -> Result<std::time::Duration> {
    limits
        .run_timeout()
        .checked_sub(started.elapsed())
        .filter(|left| !left.is_zero())
        .ok_or_else(|| run_timeout(started))
}

pub(crate) fn run_timeout(started: Instant) -> AdvisorError {
    AdvisorError::RunTimeout {
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}
