//! Guardrails around search and generation.
//!
//! Input and context guardrails run at search time (`GuardedVectorStore`);
//! the output guardrail runs at generation time (`GuardedInferencer`). Both
//! report their assessments through the same metadata keys a managed
//! guardrail service would fill in.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use rageval_core::config::GuardrailSettings;
use rageval_core::traits::{Inferencer, VectorStore};
use rageval_core::types::{Chunk, Document, InferenceMetadata, SearchResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardrailSource {
    Input,
    Context,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardrailAction {
    None,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailAssessment {
    pub policy: String,
    pub source: GuardrailSource,
    pub action: GuardrailAction,
    pub matches: Vec<String>,
}

impl GuardrailAssessment {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailVerdict {
    pub blocked: bool,
    pub assessments: Vec<GuardrailAssessment>,
}

impl GuardrailVerdict {
    fn values(&self) -> Vec<Value> {
        self.assessments.iter().map(GuardrailAssessment::to_value).collect()
    }
}

pub trait Guardrail: Send + Sync {
    fn assess(&self, source: GuardrailSource, text: &str) -> Result<GuardrailVerdict>;
    /// Replacement text shown when content is blocked.
    fn blocked_message(&self) -> &str;
}

/// Case-insensitive denied-term policy.
#[derive(Debug, Clone)]
pub struct KeywordGuardrail {
    denied_terms: Vec<String>,
    blocked_message: String,
}

impl KeywordGuardrail {
    pub fn new<I, S>(denied_terms: I, blocked_message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let denied_terms = denied_terms.into_iter().map(|t| t.as_ref().trim().to_lowercase()).filter(|t| !t.is_empty()).collect();
        Self { denied_terms, blocked_message: blocked_message.into() }
    }

    pub fn from_settings(settings: &GuardrailSettings) -> Self {
        Self::new(&settings.denied_terms, settings.blocked_message.clone())
    }
}

impl Guardrail for KeywordGuardrail {
    fn assess(&self, source: GuardrailSource, text: &str) -> Result<GuardrailVerdict> {
        let lowered = text.to_lowercase();
        let matches: Vec<String> = self.denied_terms.iter().filter(|t| lowered.contains(t.as_str())).cloned().collect();
        let blocked = !matches.is_empty();
        let assessment = GuardrailAssessment {
            policy: "denied_terms".into(),
            source,
            action: if blocked { GuardrailAction::Blocked } else { GuardrailAction::None },
            matches,
        };
        Ok(GuardrailVerdict { blocked, assessments: vec![assessment] })
    }

    fn blocked_message(&self) -> &str { &self.blocked_message }
}

/// Applies input and context guardrails around any vector store.
pub struct GuardedVectorStore<S> {
    inner: S,
    guardrail: Box<dyn Guardrail>,
    check_input: bool,
    check_context: bool,
}

impl<S: VectorStore> GuardedVectorStore<S> {
    pub fn new(inner: S, guardrail: Box<dyn Guardrail>) -> Self {
        Self { inner, guardrail, check_input: true, check_context: true }
    }

    pub fn with_checks(mut self, check_input: bool, check_context: bool) -> Self {
        self.check_input = check_input;
        self.check_context = check_context;
        self
    }

    fn assess_context(&self, documents: &[Document]) -> Result<GuardrailVerdict> {
        let mut verdict = GuardrailVerdict { blocked: false, assessments: Vec::with_capacity(documents.len()) };
        for doc in documents {
            let v = self.guardrail.assess(GuardrailSource::Context, &doc.text)?;
            verdict.blocked |= v.blocked;
            verdict.assessments.extend(v.assessments);
        }
        Ok(verdict)
    }
}

impl<S: VectorStore> VectorStore for GuardedVectorStore<S> {
    fn search(&self, chunk: &Chunk, k: usize, hierarchical: bool) -> Result<SearchResponse> {
        let input = if self.check_input { Some(self.guardrail.assess(GuardrailSource::Input, &chunk.data)?) } else { None };
        if let Some(verdict) = input.as_ref().filter(|v| v.blocked) {
            info!(source = "input", "guardrail blocked search");
            let mut response = SearchResponse::blocked(Default::default());
            response.metadata.guardrail_output = Some(self.guardrail.blocked_message().to_string());
            response.metadata.guardrail_blocked = Some(true);
            response.metadata.guardrail_input_assessment = Some(verdict.values());
            return Ok(response);
        }

        let mut response = self.inner.search(chunk, k, hierarchical)?;
        response.metadata.guardrail_input_assessment = input.map(|v| v.values());
        if !response.status || !self.check_context {
            return Ok(response);
        }

        let context = self.assess_context(&response.result)?;
        response.metadata.guardrail_context_assessment = Some(context.values());
        if context.blocked {
            info!(source = "context", "guardrail blocked search");
            response.status = false;
            response.result.clear();
            response.metadata.guardrail_output = Some(self.guardrail.blocked_message().to_string());
            response.metadata.guardrail_blocked = Some(true);
        }
        Ok(response)
    }
}

/// Applies the output guardrail to any inferencer's answer.
pub struct GuardedInferencer<I> {
    inner: I,
    guardrail: Box<dyn Guardrail>,
}

impl<I: Inferencer> GuardedInferencer<I> {
    pub fn new(inner: I, guardrail: Box<dyn Guardrail>) -> Self { Self { inner, guardrail } }
}

impl<I: Inferencer> Inferencer for GuardedInferencer<I> {
    fn generate(&self, question: &str, documents: &[Document]) -> Result<(InferenceMetadata, String)> {
        let (mut metadata, answer) = self.inner.generate(question, documents)?;
        let verdict = self.guardrail.assess(GuardrailSource::Output, &answer)?;
        metadata.guardrail_output_assessment = Some(verdict.values());
        metadata.guardrail_blocked = Some(verdict.blocked || metadata.guardrail_blocked());
        if verdict.blocked {
            warn!("guardrail blocked generated answer");
            return Ok((metadata, self.guardrail.blocked_message().to_string()));
        }
        Ok((metadata, answer))
    }
}
