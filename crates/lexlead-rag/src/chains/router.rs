use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::prompt::ROUTE_QUESTION;
use super::structured::StructuredChain;
use crate::error::Result;
use crate::llm::LLMProvider;

/// Where the workflow looks for supporting material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// The curated legal corpus
    Vectorstore,
    /// A live web search
    WebSearch,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Vectorstore => "vectorstore",
            Self::WebSearch => "web_search",
        })
    }
}

/// Route a user query to the most relevant datasource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteQuery {
    /// Given a user question choose to route it to web search or a vectorstore.
    pub datasource: DataSource,
}

pub struct QuestionRouter {
    chain: StructuredChain<RouteQuery>,
}

impl QuestionRouter {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            chain: StructuredChain::new(llm, ROUTE_QUESTION),
        }
    }

    pub async fn invoke(&self, question: &str) -> Result<DataSource> {
        let route = self.chain.invoke(&[("question", question)]).await?;
        tracing::debug!(datasource = %route.datasource, "Routed question");
        Ok(route.datasource)
    }
}
