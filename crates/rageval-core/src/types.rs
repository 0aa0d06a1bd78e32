//! Records exchanged between the retriever and its collaborators.
//!
//! Collaborator responses are loosely shaped, so every optional key is an
//! `Option` field read through a named accessor that supplies the default.
//! Unknown keys are kept in a flattened `extra` map and survive round-trips.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ChunkId = String;
pub type Metadata = serde_json::Map<String, Value>;

/// One evaluation question with its ground-truth answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub answer: String,
}

impl Question {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }

    /// The searchable unit for this question's text.
    pub fn chunk(&self) -> Chunk {
        Chunk { data: self.question.clone() }
    }
}

/// Minimal unit of text handed to a vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub data: String,
}

/// A chunk of a source document that is independently indexed.
///
/// - `id`: globally unique chunk identifier (`doc_id:index`)
/// - `doc_id`: stable document identity (file stem)
/// - `doc_path`: original path to the source file
/// - `category`: directory facet relative to the corpus root
/// - `content`: the text payload of the chunk
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub doc_path: String,
    pub category: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// A document returned by a vector store. Only `text` is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_path: Option<String>,
    /// Higher is better.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Document {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// Provenance of the query embedding produced during a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMetadata {
    pub embedder_id: String,
    pub dim: usize,
    pub input_chars: usize,
    pub latency_ms: u64,
    pub knn: usize,
    pub hierarchical: bool,
}

impl EmbeddingMetadata {
    /// JSON object form used for `RetrieverItem::query_metadata`.
    pub fn to_map(&self) -> Metadata {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Metadata::new(),
        }
    }
}

/// Metadata attached to a search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_blocked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_context_assessment: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_input_assessment: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_metadata: Option<EmbeddingMetadata>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl SearchMetadata {
    pub fn guardrail_output(&self) -> Option<&str> {
        self.guardrail_output.as_deref()
    }

    pub fn guardrail_blocked(&self) -> bool {
        self.guardrail_blocked.unwrap_or(false)
    }

    pub fn context_assessment(&self) -> Option<Vec<Value>> {
        self.guardrail_context_assessment.clone()
    }

    pub fn input_assessment(&self) -> Option<Vec<Value>> {
        self.guardrail_input_assessment.clone()
    }

    pub fn query_metadata(&self) -> Option<Metadata> {
        self.embedding_metadata.as_ref().map(EmbeddingMetadata::to_map)
    }
}

/// What a vector store hands back for one chunk.
///
/// `status == false` means the search was short-circuited (for example by an
/// input guardrail); `metadata.guardrail_output` then carries the answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub status: bool,
    #[serde(default)]
    pub result: Vec<Document>,
    #[serde(default)]
    pub metadata: SearchMetadata,
}

impl SearchResponse {
    pub fn ok(result: Vec<Document>, metadata: SearchMetadata) -> Self {
        Self { status: true, result, metadata }
    }

    pub fn blocked(metadata: SearchMetadata) -> Self {
        Self { status: false, result: Vec::new(), metadata }
    }
}

/// Metadata returned by an inferencer alongside its answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_blocked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrail_output_assessment: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl InferenceMetadata {
    pub fn guardrail_blocked(&self) -> bool {
        self.guardrail_blocked.unwrap_or(false)
    }

    pub fn output_assessment(&self) -> Option<Vec<Value>> {
        self.guardrail_output_assessment.clone()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }

    /// The full mapping, guardrail keys included when present.
    pub fn to_map(&self) -> Metadata {
        let mut map = self.extra.clone();
        if let Some(blocked) = self.guardrail_blocked {
            map.insert("guardrail_blocked".into(), Value::Bool(blocked));
        }
        if let Some(assessment) = &self.guardrail_output_assessment {
            map.insert("guardrail_output_assessment".into(), Value::Array(assessment.clone()));
        }
        map
    }
}

/// One evaluated question: the generated answer plus guardrail and
/// provenance annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieverItem {
    pub question: String,
    pub answer: String,
    pub guardrails_output_assessment: Option<Vec<Value>>,
    pub guardrails_context_assessment: Option<Vec<Value>>,
    pub guardrails_input_assessment: Option<Vec<Value>>,
    #[serde(default)]
    pub guardrails_blocked: bool,
    #[serde(default)]
    pub answer_metadata: Metadata,
    pub query_metadata: Option<Metadata>,
    #[serde(default)]
    pub reference_contexts: Vec<String>,
    pub gt_answer: String,
}
