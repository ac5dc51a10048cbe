//! Structured and free-text chain plumbing shared by every judgment.

use std::marker::PhantomData;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

use super::prompt::{Fields, PromptTemplate};
use crate::error::{AdvisorError, Result};
use crate::llm::{GenerationConfig, LLMProvider};

/// Token budget for structured judgments
pub const JUDGMENT_MAX_TOKENS: usize = 512;

/// Binary grade returned by the grading chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BinaryScore {
    Yes,
    No,
}

impl BinaryScore {
    pub fn is_yes(self) -> bool {
        self == Self::Yes
    }
}

impl<'de> Deserialize<'de> for BinaryScore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Self::Yes),
            Raw::Flag(false) => Ok(Self::No),
            Raw::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "yes" => Ok(Self::Yes),
                "no" => Ok(Self::No),
                other => Err(D::Error::custom(format!(
                    "binary_score must be 'yes' or 'no', got '{}'",
                    other
                ))),
            },
        }
    }
}

/// Output of every yes/no grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BinaryGrade {
    /// 'yes' or 'no'
    pub binary_score: BinaryScore,
}

/// Take the outermost `{...}` object out of model output, ignoring code fences
/// and surrounding prose.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&cleaned[start..=end]),
        _ => None,
    }
}

/// Strictly parse model output into `T`. Never falls back to a default.
pub fn parse_judgment<T: DeserializeOwned>(template: &str, raw: &str) -> Result<T> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AdvisorError::schema(template, "no JSON object in model output", raw))?;
    serde_json::from_str(json).map_err(|e| AdvisorError::schema(template, e.to_string(), raw))
}

/// Output-format instructions appended to a structured prompt.
pub fn schema_instructions<T: JsonSchema>() -> String {
    let schema = schemars::schema_for!(T);
    let rendered = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Respond with a single JSON object that conforms to this JSON schema:\n{}\n\
Output ONLY the JSON object, nothing else.",
        rendered
    )
}

/// A chain whose output is parsed into `T`.
pub struct StructuredChain<T> {
    llm: Arc<dyn LLMProvider>,
    template: PromptTemplate,
    config: GenerationConfig,
    _output: PhantomData<fn() -> T>,
}

impl<T: JsonSchema + DeserializeOwned> StructuredChain<T> {
    pub fn new(llm: Arc<dyn LLMProvider>, template: PromptTemplate) -> Self {
        let config = GenerationConfig {
            max_tokens: JUDGMENT_MAX_TOKENS,
            temperature: 0.0,
            ..GenerationConfig::default()
        };
        Self {
            llm,
            template,
            config,
            _output: PhantomData,
        }
    }

    pub fn template_id(&self) -> &'static str {
        self.template.id
    }

    pub async fn invoke(&self, fields: &Fields<'_>) -> Result<T> {
        let rendered = self.template.render(fields)?;
        let prompt = format!("{}\n\n{}", rendered.human, schema_instructions::<T>());
        let config = GenerationConfig {
            system_prompt: Some(rendered.system),
            ..self.config.clone()
        };

        let raw = self.llm.generate(&prompt, &config).await?;
        let parsed = parse_judgment(self.template.id, &raw);
        if let Err(err) = &parsed {
            tracing::warn!(template = self.template.id, error = %err, "Judgment did not match schema");
        }
        parsed
    }
}

/// A chain whose output is free text.
pub struct TextChain {
    llm: Arc<dyn LLMProvider>,
    template: PromptTemplate,
    config: GenerationConfig,
}

impl TextChain {
    pub fn new(llm: Arc<dyn LLMProvider>, template: PromptTemplate, config: GenerationConfig) -> Self {
        Self {
            llm,
            template,
            config,
        }
    }

    pub fn template_id(&self) -> &'static str {
        self.template.id
    }

    pub async fn invoke(&self, fields: &Fields<'_>) -> Result<String> {
        let rendered = self.template.render(fields)?;
        let config = GenerationConfig {
            system_prompt: Some(rendered.system),
            ..self.config.clone()
        };

        let raw = self.llm.generate(&rendered.human, &config).await?;
        let text = raw.trim();
        if text.is_empty() {
            return Err(AdvisorError::schema(self.template.id, "empty model output", &raw));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::prompt::GRADE_ANSWER;
    use crate::testing::MockLlm;

    #[test]
    fn test_parse_valid_json() {
        let grade: BinaryGrade = parse_judgment("grade_answer", r#"{"binary_score": "yes"}"#).unwrap();
        assert_eq!(grade.binary_score, BinaryScore::Yes);
    }

    #[test]
    fn test_parse_json_with_fences() {
        let raw = "```json\n{\"binary_score\": \"NO\"}\n```";
        let grade: BinaryGrade = parse_judgment("grade_answer", raw).unwrap();
        assert_eq!(grade.binary_score, BinaryScore::No);
    }

    #[test]
    fn test_parse_json_with_trailing_text() {
        let raw = r#"Sure. {"binary_score": true} Hope that helps!"#;
        let grade: BinaryGrade = parse_judgment("grade_answer", raw).unwrap();
        assert!(grade.binary_score.is_yes());
    }

    #[test]
    fn test_parse_garbage_is_schema_error() {
        let err = parse_judgment::<BinaryGrade>("grade_answer", "I think it is relevant").unwrap_err();
        assert!(matches!(err, AdvisorError::SchemaValidation { ref template, .. } if template == "grade_answer"));
    }

    #[test]
    fn test_parse_out_of_vocabulary_score_is_schema_error() {
        let err = parse_judgment::<BinaryGrade>("grade_document", r#"{"binary_score": "maybe"}"#)
            .unwrap_err();
        match err {
            AdvisorError::SchemaValidation { reason, .. } => assert!(reason.contains("maybe")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_schema_instructions_describe_fields() {
        let instructions = schema_instructions::<BinaryGrade>();
        assert!(instructions.contains("binary_score"));
        assert!(instructions.contains("Output ONLY the JSON object"));
    }

    #[tokio::test]
    async fn test_structured_chain_sends_system_part_and_schema() {
        let llm = Arc::new(MockLlm::new().with_default(r#"{"binary_score": "yes"}"#));
        let chain: StructuredChain<BinaryGrade> = StructuredChain::new(llm.clone(), GRADE_ANSWER);
        let grade = chain
            .invoke(&[("question", "q"), ("generation", "g")])
            .await
            .unwrap();
        assert!(grade.binary_score.is_yes());

        let call = &llm.calls()[0];
        assert!(call.prompt.contains("LLM generation: g"));
        assert!(call.prompt.contains("JSON schema"));
        assert!(call.system_prompt.as_deref().unwrap_or("").contains("grader"));
        assert_eq!(call.max_tokens, JUDGMENT_MAX_TOKENS);
        assert_eq!(call.temperature, 0.0);
    }

    #[tokio::test]
    async fn test_text_chain_rejects_empty_output() {
        let llm = Arc::new(MockLlm::new().with_default("   \n"));
        let chain = TextChain::new(llm, GRADE_ANSWER, GenerationConfig::default());
        let err = chain
            .invoke(&[("question", "q"), ("generation", "g")])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_retryable() {
        let llm = Arc::new(MockLlm::new());
        let chain: StructuredChain<BinaryGrade> = StructuredChain::new(llm, GRADE_ANSWER);
        let err = chain
            .invoke(&[("question", "q"), ("generation", "g")])
            .await
            .unwrap_err();
        assert!(matches!(err, AdvisorError::Llm(_)));
        assert!(!err.is_retryable());
    }
}
