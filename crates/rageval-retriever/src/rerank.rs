use anyhow::Result;
use tracing::debug;

use rageval_core::config::RerankSettings;
use rageval_core::traits::Reranker;
use rageval_core::types::Document;

/// Blends the retrieval score with query-term overlap:
/// `vector_weight * score + (1 - vector_weight) * overlap`, where overlap is the
/// fraction of query words present in the document text.
#[derive(Debug, Clone)]
pub struct LexicalReranker {
    vector_weight: f32,
    top_n: Option<usize>,
}

impl Default for LexicalReranker {
    fn default() -> Self { Self { vector_weight: 0.7, top_n: None } }
}

impl LexicalReranker {
    pub fn new(vector_weight: f32, top_n: Option<usize>) -> Self {
        Self { vector_weight: vector_weight.clamp(0.0, 1.0), top_n }
    }

    pub fn from_settings(settings: &RerankSettings) -> Self {
        Self::new(settings.vector_weight, settings.top_n)
    }

    fn overlap(query_words: &[String], text: &str) -> f32 {
        let text = text.to_lowercase();
        let found = query_words.iter().filter(|w| text.contains(w.as_str())).count();
        found as f32 / query_words.len() as f32
    }
}

impl Reranker for LexicalReranker {
    fn rerank(&self, query: &str, documents: Vec<Document>) -> Result<Vec<Document>> {
        let query_words: Vec<String> = query.to_lowercase().split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string()).filter(|w| !w.is_empty()).collect();
        let mut documents = documents;
        if !query_words.is_empty() {
            let mut scored: Vec<(f32, Document)> = documents
                .into_iter()
                .map(|mut doc| {
                    let blended = self.vector_weight * doc.score.unwrap_or(0.0) + (1.0 - self.vector_weight) * Self::overlap(&query_words, &doc.text);
                    doc.score = Some(blended);
                    (blended, doc)
                })
                .collect();
            // stable: ties keep retrieval order
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            documents = scored.into_iter().map(|(_, doc)| doc).collect();
        }
        if let Some(n) = self.top_n { documents.truncate(n); }
        debug!(kept = documents.len(), "lexical rerank");
        Ok(documents)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReranker;

impl Reranker for NoopReranker {
    fn rerank(&self, _query: &str, documents: Vec<Document>) -> Result<Vec<Document>> { Ok(documents) }
}
