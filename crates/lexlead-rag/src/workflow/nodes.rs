//! Node functions. Each reads the state, calls its capabilities and returns
//! the branch it took plus the single field it changes.

use crate::chains::Judge;
use crate::error::{AdvisorError, Result};
use crate::retriever::Retriever;
use crate::search::WebSearch;
use crate::state::{GraphState, StateUpdate};
use crate::types::Document;

use super::graph::{decide_to_generate, GenerationVerdict, Step};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    pub step: Step,
    pub update: StateUpdate,
}

impl NodeOutput {
    fn new(step: Step, update: StateUpdate) -> Self {
        Self { step, update }
    }
}

pub async fn route(judge: &dyn Judge, state: &GraphState) -> Result<NodeOutput> {
    let source = judge.route_question(&state.question).await?;
    tracing::info!(datasource = %source, "Routing question");
    Ok(NodeOutput::new(Step::Routed(source), StateUpdate::Unchanged))
}

/// All results folded into one document, one result per line.
pub async fn web_search(
    search: Option<&dyn WebSearch>,
    limit: usize,
    state: &GraphState,
) -> Result<NodeOutput> {
    let search = search.ok_or_else(|| {
        AdvisorError::retrieval("web_search", "no web search backend configured")
    })?;
    let results = search.search(&state.question, limit).await?;
    tracing::debug!(results = results.len(), "Web search returned");

    let documents = if results.is_empty() {
        Vec::new()
    } else {
        let text = results
            .iter()
            .map(|r| r.to_document().text)
            .collect::<Vec<_>>()
            .join("\n");
        let sources = results
            .iter()
            .map(|r| r.url.as_str())
            .filter(|u| !u.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        vec![Document::new(text)
            .with_title("Web search results")
            .with_source(sources)]
    };

    Ok(NodeOutput::new(Step::WebSearched, StateUpdate::Documents(documents)))
}

pub async fn retrieve(retriever: &dyn Retriever, k: usize, state: &GraphState) -> Result<NodeOutput> {
    let documents = retriever.retrieve(&state.question, k).await?;
    tracing::debug!(question = %state.question, retrieved = documents.len(), "Retrieved documents");
    Ok(NodeOutput::new(Step::Retrieved, StateUpdate::Documents(documents)))
}

/// Stable filter: keeps the relevant documents in their retrieved order.
pub async fn grade_documents(judge: &dyn Judge, state: &GraphState) -> Result<NodeOutput> {
    let mut kept = Vec::with_capacity(state.documents.len());
    for document in &state.documents {
        if judge.grade_document(&state.question, document).await?.is_yes() {
            kept.push(document.clone());
        }
    }

    tracing::info!(
        retrieved = state.documents.len(),
        relevant = kept.len(),
        "Graded documents"
    );

    let verdict = decide_to_generate(&kept);
    Ok(NodeOutput::new(Step::DocumentsGraded(verdict), StateUpdate::Documents(kept)))
}

pub async fn transform_query(judge: &dyn Judge, state: &GraphState) -> Result<NodeOutput> {
    let rewritten = judge.rewrite_question(&state.question).await?;
    Ok(NodeOutput::new(Step::QueryTransformed, StateUpdate::Question(rewritten)))
}

pub async fn generate(judge: &dyn Judge, state: &GraphState) -> Result<NodeOutput> {
    let generation = judge.generate(&state.question, &state.documents).await?;
    tracing::debug!(chars = generation.len(), "Generated answer");
    Ok(NodeOutput::new(Step::Generated, StateUpdate::Generation(generation)))
}

/// Groundedness first; usefulness is only asked of grounded answers.
pub async fn grade_generation(judge: &dyn Judge, state: &GraphState) -> Result<NodeOutput> {
    let generation = state.generation()?;

    let verdict = if !judge
        .grade_hallucination(&state.documents, generation)
        .await?
        .is_yes()
    {
        tracing::info!("Generation is not grounded in documents, regenerating");
        GenerationVerdict::NotSupported
    } else if judge.grade_answer(&state.question, generation).await?.is_yes() {
        tracing::info!("Generation is grounded and addresses the question");
        GenerationVerdict::Useful
    } else {
        tracing::info!("Generation is grounded but does not address the question");
        GenerationVerdict::NotUseful
    };

    Ok(NodeOutput::new(Step::GenerationGraded(verdict), StateUpdate::Unchanged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{BinaryScore, DataSource};
    use crate::search::WebResult;
    use crate::testing::{MockWebSearch, ScriptedJudge, StaticRetriever};
    use crate::workflow::graph::DocumentsVerdict;

    fn docs(texts: &[&str]) -> Vec<Document> {
        texts.iter().map(|t| Document::new(*t)).collect()
    }

    #[tokio::test]
    async fn test_route_leaves_state_alone() {
        let judge = ScriptedJudge::new().with_routes([DataSource::WebSearch]);
        let out = route(&judge, &GraphState::new("q")).await.unwrap();
        assert_eq!(out.step, Step::Routed(DataSource::WebSearch));
        assert_eq!(out.update, StateUpdate::Unchanged);
    }

    #[tokio::test]
    async fn test_grade_documents_is_stable_filter() {
        let judge = ScriptedJudge::new().grade_documents_by(|_, doc| doc.text.starts_with("keep"));
        let mut state = GraphState::new("q");
        state.documents = docs(&["keep 1", "drop 2", "keep 3", "drop 4", "keep 5"]);

        let out = grade_documents(&judge, &state).await.unwrap();
        assert_eq!(out.step, Step::DocumentsGraded(DocumentsVerdict::Generate));
        assert_eq!(out.update, StateUpdate::Documents(docs(&["keep 1", "keep 3", "keep 5"])));
    }

    #[tokio::test]
    async fn test_grade_documents_empty_goes_to_transform() {
        let judge = ScriptedJudge::new().grade_documents_by(|_, _| false);
        let mut state = GraphState::new("q");
        state.documents = docs(&["a", "b"]);
        let out = grade_documents(&judge, &state).await.unwrap();
        assert_eq!(out.step, Step::DocumentsGraded(DocumentsVerdict::TransformQuery));
        assert_eq!(out.update, StateUpdate::Documents(Vec::new()));
    }

    #[tokio::test]
    async fn test_transform_query_only_changes_question() {
        let judge = ScriptedJudge::new().with_rewrites(["better question"]);
        let mut state = GraphState::new("q");
        state.documents = docs(&["a"]);
        let out = transform_query(&judge, &state).await.unwrap();
        assert_eq!(out.update, StateUpdate::Question("better question".to_string()));
    }

    #[tokio::test]
    async fn test_web_search_folds_results_into_one_document() {
        let search = MockWebSearch::new().with_results(vec![
            WebResult {
                title: "A".into(),
                url: "https://a.example".into(),
                snippet: "first".into(),
            },
            WebResult {
                title: "B".into(),
                url: "https://b.example".into(),
                snippet: "second".into(),
            },
        ]);
        let out = web_search(Some(&search as &dyn WebSearch), 5, &GraphState::new("q")).await.unwrap();
        match out.update {
            StateUpdate::Documents(documents) => {
                assert_eq!(documents.len(), 1);
                assert_eq!(documents[0].text, "A: first\nB: second");
                assert_eq!(documents[0].source(), Some("https://a.example, https://b.example"));
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_web_search_without_backend_is_unavailable() {
        let err = web_search(None, 5, &GraphState::new("q")).await.unwrap_err();
        assert!(matches!(err, AdvisorError::RetrievalUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_retrieve_failure_propagates() {
        let retriever = StaticRetriever::failing();
        let err = retrieve(&retriever, 4, &GraphState::new("q")).await.unwrap_err();
        assert!(matches!(err, AdvisorError::RetrievalUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_grade_generation_without_generation_is_invalid_state() {
        let judge = ScriptedJudge::new();
        let err = grade_generation(&judge, &GraphState::new("q")).await.unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_grade_generation_skips_usefulness_when_ungrounded() {
        let judge = ScriptedJudge::new().with_hallucination_grades([BinaryScore::No]);
        let mut state = GraphState::new("q");
        state.generation = Some("answer".into());
        let out = grade_generation(&judge, &state).await.unwrap();
        assert_eq!(out.step, Step::GenerationGraded(GenerationVerdict::NotSupported));
        assert_eq!(judge.count_calls(|c| c.kind() == "grade_answer"), 0);
    }

    #[tokio::test]
    async fn test_grade_generation_not_useful() {
        let judge = ScriptedJudge::new().with_answer_grades([BinaryScore::No]);
        let mut state = GraphState::new("q");
        state.generation = Some("answer".into());
        let out = grade_generation(&judge, &state).await.unwrap();
        assert_eq!(out.step, Step::GenerationGraded(GenerationVerdict::NotUseful));
    }
}
