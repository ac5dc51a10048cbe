use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::types::Document;

/// Record threaded through one workflow run.
///
/// Nodes never touch it directly. Each returns a [`StateUpdate`] that the
/// engine applies once the node has finished, so an abandoned or retried node
/// leaves the state as it found it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub question: String,
    pub documents: Vec<Document>,
    pub generation: Option<String>,
}

/// The one field a node is allowed to change.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    Unchanged,
    /// Replaces the document set wholesale
    Documents(Vec<Document>),
    Question(String),
    Generation(String),
}

impl GraphState {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    /// The current generation; reading it before any generation step is a
    /// wiring bug, not a recoverable condition.
    pub fn generation(&self) -> Result<&str> {
        self.generation.as_deref().ok_or_else(|| {
            AdvisorError::InvalidState("generation graded before any generation step".to_string())
        })
    }

    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::Unchanged => {}
            StateUpdate::Documents(documents) => self.documents = documents,
            StateUpdate::Question(question) => self.question = question,
            StateUpdate::Generation(generation) => self.generation = Some(generation),
        }
    }
}
