//! Answer generators.
//!
//! `ExtractiveInferencer` answers from the top-ranked context without a model.
//! `ChatInferencer` calls an OpenAI-compatible `/chat/completions` endpoint.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error};

use rageval_core::config::InferencerSettings;
use rageval_core::traits::Inferencer;
use rageval_core::types::{Document, InferenceMetadata};

pub const NO_CONTEXT_ANSWER: &str = "I don't know based on the provided context.";

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveInferencer;

impl Inferencer for ExtractiveInferencer {
    fn generate(&self, _question: &str, documents: &[Document]) -> Result<(InferenceMetadata, String)> {
        let mut metadata = InferenceMetadata::default();
        metadata.insert("strategy", "extractive");
        metadata.insert("context_count", documents.len());
        let answer = documents.first().map_or_else(|| NO_CONTEXT_ANSWER.to_string(), |d| d.text.clone());
        Ok((metadata, answer))
    }
}

const SYSTEM_PROMPT: &str = "Answer the question using only the numbered context passages. \
If the context does not contain the answer, say you don't know.";

pub struct ChatInferencer {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

impl ChatInferencer {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, model, Duration::from_secs(60))
    }

    fn with_timeout(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
            temperature: 0.0,
            max_tokens: 512,
        })
    }

    pub fn from_settings(settings: &InferencerSettings) -> Result<Self> {
        let endpoint = settings.endpoint.clone().ok_or_else(|| anyhow!("inferencer.endpoint is required for chat"))?;
        let model = settings.model.clone().ok_or_else(|| anyhow!("inferencer.model is required for chat"))?;
        let mut inferencer = Self::with_timeout(endpoint, model, Duration::from_secs(settings.timeout_secs))?;
        inferencer.api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());
        inferencer.temperature = settings.temperature;
        inferencer.max_tokens = settings.max_tokens;
        Ok(inferencer)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Numbered context block followed by the question.
pub fn build_prompt(question: &str, documents: &[Document]) -> String {
    let mut prompt = String::from("Context:\n");
    if documents.is_empty() {
        prompt.push_str("(none)\n");
    }
    for (i, doc) in documents.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", i + 1, doc.text.trim()));
    }
    prompt.push_str(&format!("\nQuestion: {}\nAnswer:", question));
    prompt
}

// ── OpenAI-compatible request/response types ──────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl Inferencer for ChatInferencer {
    fn generate(&self, question: &str, documents: &[Document]) -> Result<(InferenceMetadata, String)> {
        let prompt = build_prompt(question, documents);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT },
                ChatMessage { role: "user", content: &prompt },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        debug!(model = %self.model, contexts = documents.len(), "chat completion");
        let started = Instant::now();
        let mut request = self.client.post(format!("{}/chat/completions", self.endpoint)).json(&body);
        if let Some(key) = &self.api_key { request = request.bearer_auth(key); }
        let response = request.send().map_err(|e| {
            error!(error = %e, "chat request failed");
            anyhow!("chat request failed: {e}")
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
            error!(%status, "chat API error");
            bail!("chat API returned {status}: {detail}");
        }

        let parsed: ChatResponse = response.json().map_err(|e| anyhow!("failed to parse chat response: {e}"))?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| anyhow!("chat response had no choices"))?;
        let answer = choice.message.content.unwrap_or_default().trim().to_string();

        let mut metadata = InferenceMetadata::default();
        metadata.insert("strategy", "chat");
        metadata.insert("model", self.model.clone());
        metadata.insert("context_count", documents.len());
        metadata.insert("latency_ms", u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
        if let Some(reason) = choice.finish_reason { metadata.insert("finish_reason", reason); }
        if let Some(usage) = parsed.usage { metadata.insert("usage", usage); }
        Ok((metadata, answer))
    }
}
