//! Prompt templates for the judgment chains.
//!
//! Each template has a stable id, a system part and a human part. Placeholders
//! are written `{name}` and must all be supplied at render time.

use crate::error::{AdvisorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub id: &'static str,
    pub system: &'static str,
    pub human: &'static str,
}

/// Named text fields substituted into a template.
pub type Fields<'a> = [(&'a str, &'a str)];

/// A template with every placeholder filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub human: String,
}

impl PromptTemplate {
    pub fn render(&self, fields: &Fields<'_>) -> Result<RenderedPrompt> {
        Ok(RenderedPrompt {
            system: fill(self.id, self.system, fields)?,
            human: fill(self.id, self.human, fields)?,
        })
    }
}

/// Substitute `{name}` placeholders. Braces around anything that is not an
/// identifier are left alone, and substituted values are never re-scanned.
fn fill(template_id: &'static str, text: &str, fields: &Fields<'_>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());

        if name_len > 0 && after[name_len..].starts_with('}') {
            let name = &after[..name_len];
            let value = fields
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
                .ok_or_else(|| AdvisorError::Template {
                    template: template_id,
                    field: name.to_string(),
                })?;
            out.push_str(value);
            rest = &after[name_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);
    Ok(out)
}

pub const ROUTE_QUESTION: PromptTemplate = PromptTemplate {
    id: "route_question",
    system: "You are an expert at routing a user question to a vectorstore or web search.\n\
The vectorstore contains Illinois statutes, case summaries and legal practice \
materials: landlord-tenant law, family law, criminal procedure, contracts, \
torts and civil procedure in Illinois courts.\n\
Use the vectorstore for questions on these topics. Otherwise, use web_search.",
    human: "Question: {question}",
};

pub const GRADE_DOCUMENT: PromptTemplate = PromptTemplate {
    id: "grade_document",
    system: "You are a grader assessing relevance of a retrieved document to a user question.\n\
If the document contains keyword(s) or semantic meaning related to the user \
question, grade it as relevant. It does not need to be a stringent test; the \
goal is to filter out erroneous retrievals.\n\
Give a binary score 'yes' or 'no' to indicate whether the document is relevant to the question.",
    human: "Retrieved document:\n\n{document}\n\nUser question: {question}",
};

pub const GRADE_HALLUCINATION: PromptTemplate = PromptTemplate {
    id: "grade_hallucination",
    system: "You are a grader assessing whether an LLM generation is grounded in / \
supported by a set of retrieved facts.\n\
Give a binary score 'yes' or 'no'. 'Yes' means that the answer is grounded in \
/ supported by the set of facts.",
    human: "Set of facts:\n\n{documents}\n\nLLM generation: {generation}",
};

pub const GRADE_ANSWER: PromptTemplate = PromptTemplate {
    id: "grade_answer",
    system: "You are a grader assessing whether an answer addresses / resolves a question.\n\
Give a binary score 'yes' or 'no'. 'Yes' means that the answer resolves the question.",
    human: "User question:\n\n{question}\n\nLLM generation: {generation}",
};

pub const REWRITE_QUESTION: PromptTemplate = PromptTemplate {
    id: "rewrite_question",
    system: "You are a question re-writer that converts an input question to a better \
version that is optimized for retrieval from a legal knowledge base.\n\
Look at the input and try to reason about the underlying semantic intent and \
the legal concepts involved. Reply with the improved question only.",
    human: "Here is the initial question:\n\n{question}\n\nFormulate an improved question.",
};

pub const GENERATE_ANSWER: PromptTemplate = PromptTemplate {
    id: "generate_answer",
    system: "You are an assistant for question-answering tasks on Illinois law.\n\
Use only the following pieces of retrieved context to answer the question. \
If the context does not contain the answer, just say that you don't know. \
Keep the answer concise and name the statutes or cases you rely on.",
    human: "Context:\n{context}\n\nQuestion: {question}\n\nAnswer:",
};

pub const EVALUATE_QUESTION: PromptTemplate = PromptTemplate {
    id: "evaluate_question",
    system: "You are an expert legal analyst. Classify the user's question.\n\n\
Categories:\n\
- issue-spotting: identify the legal issues raised by a fact pattern.\n\
- rule-recall: state the legal rule that governs a topic.\n\
- rule-application: apply a legal rule to specific facts.\n\
- rule-conclusion: predict the legal outcome of applying a rule to facts.\n\
- interpretation: reason about the meaning of a statute, clause or opinion.\n\
- rhetorical-understanding: understand the purpose or structure of a legal argument.\n\
- out-of-scope: not a legal question.\n\n\
Decide whether retrieving Illinois legal sources would help answer it \
(is_rag_useful), rate its difficulty as easy, medium or hard, explain the \
difficulty rating in one or two sentences, and state whether the question \
concerns Illinois law (is_illinois_law).",
    human: "Question: {question}",
};

pub const WEB_ANSWER: PromptTemplate = PromptTemplate {
    id: "web_answer",
    system: "You are a legal research assistant.\n\
Answer the question based only on the context provided, then give a short \
summary of the sources used with citations by result number and URL.",
    human: "Context:\n{context}\n\nQuestion: {question}",
};

pub const DIRECT_ANSWER: PromptTemplate = PromptTemplate {
    id: "direct_answer",
    system: "You are a knowledgeable legal assistant. Answer the user's question \
clearly and concisely. Say so when the answer depends on jurisdiction or facts \
you do not have.",
    human: "{question}",
};
