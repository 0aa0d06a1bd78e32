//! Chunk-to-parent lifting for hierarchical search.
//!
//! A flat search returns matching chunks. A hierarchical search returns the
//! parent documents of those chunks, reassembled from all sibling chunks in
//! `chunk_index` order and ranked by their best-scoring child.

use rageval_core::types::{Document, Metadata};
use serde_json::Value;

// Extra chunk candidates per requested parent.
const PARENT_FANOUT: usize = 4;

/// Number of chunk hits to fetch so that `k` distinct parents are likely.
pub fn candidate_limit(k: usize) -> usize {
    k.saturating_mul(PARENT_FANOUT)
}

/// One row read back from the documents table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHit {
    pub id: String,
    pub doc_id: String,
    pub doc_path: String,
    pub category: String,
    pub content: String,
    pub chunk_index: usize,
    pub score: f32,
}

impl ChunkHit {
    pub fn into_document(self) -> Document {
        let mut extra = Metadata::new();
        extra.insert("category".into(), Value::from(self.category));
        extra.insert("chunk_index".into(), Value::from(self.chunk_index));
        Document {
            text: self.content,
            id: Some(self.id),
            doc_id: Some(self.doc_id),
            doc_path: Some(self.doc_path),
            score: Some(self.score),
            extra,
        }
    }
}

/// A parent document selected from chunk hits.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentRef {
    pub doc_id: String,
    pub score: f32,
    pub matched: Vec<String>,
}

/// Distinct parents in first-hit order, at most `k`. Hits must be sorted best first.
pub fn select_parents(hits: &[ChunkHit], k: usize) -> Vec<ParentRef> {
    let mut parents: Vec<ParentRef> = Vec::new();
    for hit in hits {
        let len = parents.len();
        match parents.iter_mut().find(|p| p.doc_id == hit.doc_id) {
            Some(parent) => {
                parent.score = parent.score.max(hit.score);
                parent.matched.push(hit.id.clone());
            }
            None if len < k => parents.push(ParentRef {
                doc_id: hit.doc_id.clone(),
                score: hit.score,
                matched: vec![hit.id.clone()],
            }),
            None => {}
        }
    }
    parents
}

/// Join all sibling chunks of `parent` into one document.
pub fn assemble_parent(parent: ParentRef, mut siblings: Vec<ChunkHit>) -> Document {
    siblings.sort_by_key(|c| c.chunk_index);
    siblings.dedup_by_key(|c| c.chunk_index);
    let text = siblings.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n");
    let (doc_path, category) = siblings
        .first()
        .map(|c| (c.doc_path.clone(), c.category.clone()))
        .unwrap_or_default();
    let mut extra = Metadata::new();
    extra.insert("category".into(), Value::from(category));
    extra.insert("chunk_count".into(), Value::from(siblings.len()));
    extra.insert("matched_chunks".into(), Value::from(parent.matched));
    Document {
        text,
        id: Some(parent.doc_id.clone()),
        doc_id: Some(parent.doc_id),
        doc_path: Some(doc_path),
        score: Some(parent.score),
        extra,
    }
}
