//! Answer-producing chains.

use std::sync::Arc;

use super::prompt::{DIRECT_ANSWER, GENERATE_ANSWER, WEB_ANSWER};
use super::structured::TextChain;
use crate::error::Result;
use crate::llm::{format_context, GenerationConfig, LLMProvider};
use crate::types::Document;

/// Answers from the supplied documents only, declining when they fall short.
pub struct Generator {
    chain: TextChain,
}

impl Generator {
    pub fn new(llm: Arc<dyn LLMProvider>, config: GenerationConfig) -> Self {
        Self {
            chain: TextChain::new(llm, GENERATE_ANSWER, config),
        }
    }

    pub async fn invoke(&self, question: &str, documents: &[Document]) -> Result<String> {
        let context = render_context(documents);
        self.chain
            .invoke(&[("context", context.as_str()), ("question", question)])
            .await
    }
}

/// Answers from web search results and cites them.
pub struct WebAnswerer {
    chain: TextChain,
}

impl WebAnswerer {
    pub fn new(llm: Arc<dyn LLMProvider>, config: GenerationConfig) -> Self {
        Self {
            chain: TextChain::new(llm, WEB_ANSWER, config),
        }
    }

    pub async fn invoke(&self, question: &str, documents: &[Document]) -> Result<String> {
        let context = render_context(documents);
        self.chain
            .invoke(&[("context", context.as_str()), ("question", question)])
            .await
    }
}

/// Plain chat answer without any retrieved context.
pub struct DirectAnswerer {
    chain: TextChain,
}

impl DirectAnswerer {
    pub fn new(llm: Arc<dyn LLMProvider>, config: GenerationConfig) -> Self {
        Self {
            chain: TextChain::new(llm, DIRECT_ANSWER, config),
        }
    }

    pub async fn invoke(&self, question: &str) -> Result<String> {
        self.chain.invoke(&[("question", question)]).await
    }
}

/// Numbered context blocks, each headed by its source when known.
fn render_context(documents: &[Document]) -> String {
    let passages: Vec<String> = documents
        .iter()
        .map(|doc| match (doc.title(), doc.source()) {
            (None, None) => doc.text.clone(),
            _ => format!("Source: {}\n{}", doc.reference(), doc.text),
        })
        .collect();
    format_context(&passages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;

    #[test]
    fn test_render_context_labels_sources() {
        let docs = vec![
            Document::new("Deposits returned within 30 days.")
                .with_title("Security Deposit Return Act")
                .with_source("765 ILCS 710"),
            Document::new("Bare passage."),
        ];
        let context = render_context(&docs);
        assert!(context.starts_with(
            "[Document 1]\nSource: Security Deposit Return Act (765 ILCS 710)\nDeposits"
        ));
        assert!(context.ends_with("[Document 2]\nBare passage."));
    }

    #[tokio::test]
    async fn test_generator_uses_context_and_question() {
        let llm = Arc::new(MockLlm::new().with_default("  Within 30 days.  "));
        let generator = Generator::new(llm.clone(), GenerationConfig::default());
        let docs = vec![Document::new("Deposits returned within 30 days.")];
        let answer = generator.invoke("deposit deadline?", &docs).await.unwrap();
        assert_eq!(answer, "Within 30 days.");

        let call = &llm.calls()[0];
        assert!(call.prompt.contains("[Document 1]\nDeposits returned within 30 days."));
        assert!(call.prompt.contains("Question: deposit deadline?"));
        assert!(call.system_prompt.as_deref().unwrap_or("").contains("don't know"));
    }

    #[tokio::test]
    async fn test_direct_answerer_sends_bare_question() {
        let llm = Arc::new(MockLlm::new().with_default("A tort is a civil wrong."));
        let direct = DirectAnswerer::new(llm.clone(), GenerationConfig::default());
        assert_eq!(direct.invoke("What is a tort?").await.unwrap(), "A tort is a civil wrong.");
        assert_eq!(llm.calls()[0].prompt, "What is a tort?");
    }
}
