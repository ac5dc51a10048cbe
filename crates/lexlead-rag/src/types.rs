use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TITLE_KEY: &str = "title";
pub const SOURCE_KEY: &str = "source";

/// A retrieved passage: body text plus free-form source metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.with_meta(TITLE_KEY, title)
    }

    pub fn with_source(self, source: impl Into<String>) -> Self {
        self.with_meta(SOURCE_KEY, source)
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get(TITLE_KEY).map(String::as_str)
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }

    pub fn reference(&self) -> DocumentRef {
        DocumentRef {
            title: self.title().map(str::to_string),
            source: self.source().map(str::to_string),
        }
    }
}

/// Where a contributing document came from, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub title: Option<String>,
    pub source: Option<String>,
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.title, &self.source) {
            (Some(title), Some(source)) => write!(f, "{} ({})", title, source),
            (Some(title), None) => write!(f, "{}", title),
            (None, Some(source)) => write!(f, "{}", source),
            (None, None) => write!(f, "(untitled)"),
        }
    }
}

/// Concatenate document bodies for prompts that take the whole set at once.
pub fn join_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
