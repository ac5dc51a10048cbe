use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::graph::Node;
use crate::types::DocumentRef;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Grounded in the documents and judged useful
    Verified { answer: String },
    /// A loop bound was hit after at least one generation; the last one is
    /// returned without a passing grade
    Unverified { answer: String, reason: String },
    /// A loop bound was hit before anything was generated
    NoAnswer { reason: String },
    /// Produced outside the grading loop (plain LLM or web-grounded pass)
    Direct { answer: String },
}

impl AnswerOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Verified { answer } | Self::Unverified { answer, .. } | Self::Direct { answer } => {
                Some(answer)
            }
            Self::NoAnswer { .. } => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Verified { .. } => "verified",
            Self::Unverified { .. } => "unverified",
            Self::NoAnswer { .. } => "no_answer",
            Self::Direct { .. } => "direct",
        }
    }
}

/// What happened during one run, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTrace {
    pub run_id: Uuid,
    pub visited: Vec<Node>,
    /// The original question followed by every rewrite
    pub questions: Vec<String>,
    pub rewrites: usize,
    pub regenerations: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
}

impl RunTrace {
    pub fn start(question: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            visited: Vec::new(),
            questions: vec![question.to_string()],
            rewrites: 0,
            regenerations: 0,
            started_at: Utc::now(),
            finished_at: None,
            elapsed_ms: 0,
        }
    }

    pub fn enter(&mut self, node: Node) {
        self.visited.push(node);
    }

    pub fn visits(&self) -> usize {
        self.visited.len()
    }

    pub fn count(&self, node: Node) -> usize {
        self.visited.iter().filter(|n| **n == node).count()
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.elapsed_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(now);
    }
}

/// Final answer plus the documents and trace behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub question: String,
    /// The question after any rewrites
    pub final_question: String,
    pub outcome: AnswerOutcome,
    pub documents: Vec<DocumentRef>,
    pub trace: RunTrace,
}

impl AnswerResult {
    pub fn answer(&self) -> Option<&str> {
        self.outcome.answer()
    }
}
