//! Nodes, branch verdicts and the transition table.

use serde::{Deserialize, Serialize};

use crate::chains::DataSource;
use crate::types::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Route,
    WebSearch,
    Retrieve,
    GradeDocuments,
    TransformQuery,
    Generate,
    GradeGeneration,
}

impl Node {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::WebSearch => "web_search",
            Self::Retrieve => "retrieve",
            Self::GradeDocuments => "grade_documents",
            Self::TransformQuery => "transform_query",
            Self::Generate => "generate",
            Self::GradeGeneration => "grade_generation",
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of document grading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentsVerdict {
    Generate,
    TransformQuery,
}

/// Outcome of grading a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationVerdict {
    /// Not grounded in the documents
    NotSupported,
    /// Grounded and resolves the question
    Useful,
    /// Grounded but does not resolve the question
    NotUseful,
}

/// What a node reports back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Routed(DataSource),
    WebSearched,
    Retrieved,
    DocumentsGraded(DocumentsVerdict),
    QueryTransformed,
    Generated,
    GenerationGraded(GenerationVerdict),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(Node),
    End,
}

impl Step {
    pub fn next(self) -> Transition {
        match self {
            Self::Routed(DataSource::WebSearch) => Transition::To(Node::WebSearch),
            Self::Routed(DataSource::Vectorstore) => Transition::To(Node::Retrieve),
            Self::WebSearched => Transition::To(Node::Generate),
            Self::Retrieved => Transition::To(Node::GradeDocuments),
            Self::DocumentsGraded(DocumentsVerdict::Generate) => Transition::To(Node::Generate),
            Self::DocumentsGraded(DocumentsVerdict::TransformQuery) => {
                Transition::To(Node::TransformQuery)
            }
            Self::QueryTransformed => Transition::To(Node::Retrieve),
            Self::Generated => Transition::To(Node::GradeGeneration),
            Self::GenerationGraded(GenerationVerdict::NotSupported) => Transition::To(Node::Generate),
            Self::GenerationGraded(GenerationVerdict::Useful) => Transition::End,
            Self::GenerationGraded(GenerationVerdict::NotUseful) => {
                Transition::To(Node::TransformQuery)
            }
        }
    }
}

/// Generate when grading kept anything, otherwise rewrite the question.
pub fn decide_to_generate(graded: &[Document]) -> DocumentsVerdict {
    if graded.is_empty() {
        tracing::info!("All documents graded irrelevant, transforming query");
        DocumentsVerdict::TransformQuery
    } else {
        DocumentsVerdict::Generate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert_eq!(Step::Routed(DataSource::WebSearch).next(), Transition::To(Node::WebSearch));
        assert_eq!(Step::Routed(DataSource::Vectorstore).next(), Transition::To(Node::Retrieve));
        assert_eq!(Step::WebSearched.next(), Transition::To(Node::Generate));
        assert_eq!(Step::Retrieved.next(), Transition::To(Node::GradeDocuments));
        assert_eq!(Step::QueryTransformed.next(), Transition::To(Node::Retrieve));
        assert_eq!(Step::Generated.next(), Transition::To(Node::GradeGeneration));
        assert_eq!(
            Step::GenerationGraded(GenerationVerdict::NotSupported).next(),
            Transition::To(Node::Generate)
        );
        assert_eq!(Step::GenerationGraded(GenerationVerdict::Useful).next(), Transition::End);
        assert_eq!(
            Step::GenerationGraded(GenerationVerdict::NotUseful).next(),
            Transition::To(Node::TransformQuery)
        );
    }

    #[test]
    fn test_decide_to_generate() {
        assert_eq!(decide_to_generate(&[]), DocumentsVerdict::TransformQuery);
        assert_eq!(decide_to_generate(&[Document::new("kept")]), DocumentsVerdict::Generate);
        assert_eq!(
            Step::DocumentsGraded(decide_to_generate(&[])).next(),
            Transition::To(Node::TransformQuery)
        );
    }
}
