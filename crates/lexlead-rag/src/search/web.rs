//! Live web search for questions the corpus does not cover.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::WebSearchConfig;
use crate::error::{AdvisorError, Result};
use crate::types::Document;

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search.json";
const SERPAPI_NO_RESULTS: &str = "hasn't returned any results";

/// One result from a web search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl WebResult {
    pub fn to_document(&self) -> Document {
        let text = if self.title.is_empty() {
            self.snippet.clone()
        } else {
            format!("{}: {}", self.title, self.snippet)
        };
        Document::new(text)
            .with_title(self.title.clone())
            .with_source(self.url.clone())
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// At most `limit` results, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>>;
}

/// SerpAPI-backed web search (Google engine by default).
pub struct SerpApiSearch {
    api_key: String,
    engine: String,
    location: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl SerpApiSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            engine: "google".to_string(),
            location: None,
            endpoint: SERPAPI_ENDPOINT.to_string(),
            client: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(15))
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &WebSearchConfig) -> Option<Self> {
        let api_key = config.api_key.as_deref()?.trim();
        if api_key.is_empty() {
            return None;
        }
        let mut search = Self::new(api_key);
        search.engine = config.engine.clone();
        search.location = config.location.clone();
        Some(search)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl WebSearch for SerpApiSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>> {
        let num = limit.to_string();
        let mut params = vec![
            ("engine", self.engine.as_str()),
            ("q", query),
            ("num", num.as_str()),
            ("api_key", self.api_key.as_str()),
        ];
        if let Some(location) = &self.location {
            params.push(("location", location.as_str()));
        }

        tracing::debug!(engine = %self.engine, query = %query, limit, "Sending SerpAPI request");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(endpoint = %self.endpoint, error = %e, "SerpAPI request failed");
                AdvisorError::retrieval("web_search", e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(endpoint = %self.endpoint, status = %status, error = %body, "SerpAPI returned error");
            return Err(AdvisorError::retrieval(
                "web_search",
                format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>()),
            ));
        }

        let body: SerpResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::retrieval("web_search", format!("invalid response: {}", e)))?;
        let results = interpret(body, limit)?;
        tracing::info!(query = %query, results = results.len(), "Web search complete");
        Ok(results)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    answer_box: Option<SerpAnswerBox>,
    #[serde(default)]
    organic_results: Vec<SerpOrganic>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    search_metadata: Option<SerpMetadata>,
}

#[derive(Debug, Deserialize)]
struct SerpMetadata {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpAnswerBox {
    title: Option<String>,
    link: Option<String>,
    answer: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// SerpAPI reports an empty result page through `error` on a successful
/// search; only other errors mean the backend is unavailable.
fn interpret(body: SerpResponse, limit: usize) -> Result<Vec<WebResult>> {
    if let Some(error) = &body.error {
        let succeeded = body
            .search_metadata
            .as_ref()
            .and_then(|m| m.status.as_deref())
            == Some("Success");
        if !succeeded && !error.contains(SERPAPI_NO_RESULTS) {
            return Err(AdvisorError::retrieval("web_search", error.clone()));
        }
        tracing::info!(reason = %error, "Web search returned no results");
        return Ok(Vec::new());
    }
    Ok(collect_results(body, limit))
}

/// Answer box first (when it has text), then organic results.
fn collect_results(body: SerpResponse, limit: usize) -> Vec<WebResult> {
    let answer = body.answer_box.and_then(|answer_box| {
        let text = answer_box.answer.or(answer_box.snippet)?;
        Some(WebResult {
            title: answer_box.title.unwrap_or_else(|| "Answer".to_string()),
            url: answer_box.link.unwrap_or_default(),
            snippet: text,
        })
    });

    answer
        .into_iter()
        .chain(body.organic_results.into_iter().map(|r| WebResult {
            title: r.title,
            url: r.link,
            snippet: r.snippet,
        }))
        .filter(|r| !r.snippet.trim().is_empty())
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> SerpResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_collects_answer_box_then_organic() {
        let body = parse(
            r#"{
                "answer_box": {"title": "Illinois eviction", "answer": "5-day notice", "link": "https://a.example"},
                "organic_results": [
                    {"title": "Eviction guide", "link": "https://b.example", "snippet": "Landlords must serve notice."},
                    {"title": "Empty", "link": "https://c.example", "snippet": ""},
                    {"title": "Court help", "link": "https://d.example", "snippet": "Illinois court forms."}
                ]
            }"#,
        );
        let results = collect_results(body, 5);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].snippet, "5-day notice");
        assert_eq!(results[1].url, "https://b.example");
        assert_eq!(results[2].title, "Court help");
    }

    #[test]
    fn test_limit_applies_after_filtering() {
        let body = parse(
            r#"{"organic_results": [
                {"title": "a", "link": "1", "snippet": "x"},
                {"title": "b", "link": "2", "snippet": "y"},
                {"title": "c", "link": "3", "snippet": "z"}
            ]}"#,
        );
        assert_eq!(collect_results(body, 2).len(), 2);
        assert!(collect_results(parse("{}"), 5).is_empty());
    }

    #[test]
    fn test_empty_result_page_is_not_an_error() {
        let body = parse(
            r#"{
                "search_metadata": {"id": "abc", "status": "Success"},
                "search_parameters": {"engine": "google", "q": "zxqv nonsense"},
                "search_information": {"organic_results_state": "Fully empty"},
                "error": "Google hasn't returned any results for this query."
            }"#,
        );
        assert!(interpret(body, 5).unwrap().is_empty());

        let without_metadata = parse(r#"{"error": "Google hasn't returned any results for this query."}"#);
        assert!(interpret(without_metadata, 5).unwrap().is_empty());
    }

    #[test]
    fn test_backend_error_is_retrieval_unavailable() {
        let body = parse(
            r#"{"search_metadata": {"status": "Error"}, "error": "Invalid API key. Your API key should be here: https://serpapi.com/manage-api-key"}"#,
        );
        let err = interpret(body, 5).unwrap_err();
        assert!(matches!(err, AdvisorError::RetrievalUnavailable { ref reason, .. } if reason.starts_with("Invalid API key")));
    }

    #[test]
    fn test_result_to_document_keeps_reference() {
        let result = WebResult {
            title: "Eviction guide".to_string(),
            url: "https://b.example".to_string(),
            snippet: "Landlords must serve notice.".to_string(),
        };
        let doc = result.to_document();
        assert_eq!(doc.text, "Eviction guide: Landlords must serve notice.");
        assert_eq!(doc.source(), Some("https://b.example"));
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = WebSearchConfig::default();
        assert!(SerpApiSearch::from_config(&config).is_none());
        config.api_key = Some("  ".to_string());
        assert!(SerpApiSearch::from_config(&config).is_none());
        config.api_key = Some("serp-key".to_string());
        assert!(SerpApiSearch::from_config(&config).is_some());
    }

    /// Serve a single JSON response on a local port.
    async fn serve_once(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/search.json", addr)
    }

    #[tokio::test]
    async fn test_search_with_no_matches_returns_empty() {
        let endpoint = serve_once(
            r#"{"search_metadata": {"status": "Success"}, "error": "Google hasn't returned any results for this query."}"#,
        )
        .await;
        let search = SerpApiSearch::new("key").with_endpoint(endpoint);
        let results = search.search("zxqv nonsense", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_retrieval_unavailable() {
        let search = SerpApiSearch::new("key").with_endpoint("http://127.0.0.1:1/search.json");
        let err = search.search("eviction notice", 3).await.unwrap_err();
        assert!(matches!(err, AdvisorError::RetrievalUnavailable { ref source_name, .. } if source_name == "web_search"));
    }
}
