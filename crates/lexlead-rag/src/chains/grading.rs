//! Yes/no graders: document relevance, groundedness and usefulness.

use std::sync::Arc;

use super::prompt::{GRADE_ANSWER, GRADE_DOCUMENT, GRADE_HALLUCINATION};
use super::structured::{BinaryGrade, BinaryScore, StructuredChain};
use crate::error::Result;
use crate::llm::LLMProvider;
use crate::types::{join_documents, Document};

/// Is a retrieved document relevant to the question?
pub struct DocumentRelevanceGrader {
    chain: StructuredChain<BinaryGrade>,
}

impl DocumentRelevanceGrader {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            chain: StructuredChain::new(llm, GRADE_DOCUMENT),
        }
    }

    pub async fn invoke(&self, question: &str, document: &Document) -> Result<BinaryScore> {
        let grade = self
            .chain
            .invoke(&[("question", question), ("document", document.text.as_str())])
            .await?;
        Ok(grade.binary_score)
    }
}

/// Is the generation supported by the documents?
pub struct HallucinationGrader {
    chain: StructuredChain<BinaryGrade>,
}

impl HallucinationGrader {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            chain: StructuredChain::new(llm, GRADE_HALLUCINATION),
        }
    }

    pub async fn invoke(&self, documents: &[Document], generation: &str) -> Result<BinaryScore> {
        let facts = join_documents(documents);
        let grade = self
            .chain
            .invoke(&[("documents", facts.as_str()), ("generation", generation)])
            .await?;
        Ok(grade.binary_score)
    }
}

/// Does the generation resolve the question?
pub struct AnswerUsefulnessGrader {
    chain: StructuredChain<BinaryGrade>,
}

impl AnswerUsefulnessGrader {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            chain: StructuredChain::new(llm, GRADE_ANSWER),
        }
    }

    pub async fn invoke(&self, question: &str, generation: &str) -> Result<BinaryScore> {
        let grade = self
            .chain
            .invoke(&[("question", question), ("generation", generation)])
            .await?;
        Ok(grade.binary_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;

    #[tokio::test]
    async fn test_document_grader_sees_question_and_document() {
        let llm = Arc::new(MockLlm::new().with_default(r#"{"binary_score": "yes"}"#));
        let grader = DocumentRelevanceGrader::new(llm.clone());
        let doc = Document::new("765 ILCS 710/1: deposits returned within 30 days");
        let score = grader.invoke("security deposit deadline", &doc).await.unwrap();
        assert_eq!(score, BinaryScore::Yes);

        let prompt = &llm.calls()[0].prompt;
        assert!(prompt.contains("765 ILCS 710/1"));
        assert!(prompt.contains("security deposit deadline"));
    }

    #[tokio::test]
    async fn test_hallucination_grader_joins_documents() {
        let llm = Arc::new(MockLlm::new().with_default(r#"{"binary_score": "no"}"#));
        let grader = HallucinationGrader::new(llm.clone());
        let docs = vec![Document::new("fact one"), Document::new("fact two")];
        let score = grader.invoke(&docs, "made-up claim").await.unwrap();
        assert_eq!(score, BinaryScore::No);
        assert!(llm.calls()[0].prompt.contains("fact one\n\nfact two"));
    }

    #[tokio::test]
    async fn test_answer_grader_routes_by_prompt() {
        let llm = Arc::new(
            MockLlm::new()
                .when("LLM generation: I don't know", r#"{"binary_score": "no"}"#)
                .with_default(r#"{"binary_score": "yes"}"#),
        );
        let grader = AnswerUsefulnessGrader::new(llm);
        assert_eq!(grader.invoke("q", "I don't know").await.unwrap(), BinaryScore::No);
        assert_eq!(grader.invoke("q", "Thirty days.").await.unwrap(), BinaryScore::Yes);
    }
}
