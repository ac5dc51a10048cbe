use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::prompt::REWRITE_QUESTION;
use super::structured::TextChain;
use crate::error::{AdvisorError, Result};
use crate::llm::{GenerationConfig, LLMProvider};

static LEADING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\*\*)?(?:improved|rewritten|better|refined)?\s*(?:question|query)(?:\*\*)?\s*:\s*(?:\*\*)?\s*")
        .expect("leading label regex is valid")
});

/// Rewrites a question into a form better suited to corpus retrieval.
pub struct QuestionRewriter {
    chain: TextChain,
}

impl QuestionRewriter {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        let config = GenerationConfig {
            max_tokens: 256,
            temperature: 0.0,
            ..GenerationConfig::default()
        };
        Self {
            chain: TextChain::new(llm, REWRITE_QUESTION, config),
        }
    }

    pub async fn invoke(&self, question: &str) -> Result<String> {
        let raw = self.chain.invoke(&[("question", question)]).await?;
        let rewritten = clean_rewrite(&raw);
        if rewritten.is_empty() {
            return Err(AdvisorError::schema(
                self.chain.template_id(),
                "rewrite produced no question",
                &raw,
            ));
        }
        tracing::info!(original = %question, rewritten = %rewritten, "Rewrote question");
        Ok(rewritten)
    }
}

/// Keep the first non-empty line, minus any "Improved question:" label and
/// surrounding quotes.
pub fn clean_rewrite(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !LEADING_LABEL.replace(line, "").trim().is_empty())
        .unwrap_or("");
    let unlabeled = LEADING_LABEL.replace(line, "");
    unlabeled
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”' || c == '`')
        .trim()
        .to_string()
}
