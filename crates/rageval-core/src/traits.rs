use std::path::Path;

use crate::types::{Chunk, Document, InferenceMetadata, Question, SearchResponse};

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `bge-m3:d1024`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

pub trait QuestionSource: Send + Sync {
    fn read_all(&self, path: &Path) -> anyhow::Result<Vec<Question>>;
}

pub trait VectorStore: Send + Sync {
    fn search(&self, chunk: &Chunk, k: usize, hierarchical: bool) -> anyhow::Result<SearchResponse>;
}

pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, documents: Vec<Document>) -> anyhow::Result<Vec<Document>>;
}

pub trait Inferencer: Send + Sync {
    fn generate(&self, question: &str, documents: &[Document]) -> anyhow::Result<(InferenceMetadata, String)>;
}

impl<T: VectorStore + ?Sized> VectorStore for Box<T> {
    fn search(&self, chunk: &Chunk, k: usize, hierarchical: bool) -> anyhow::Result<SearchResponse> {
        (**self).search(chunk, k, hierarchical)
    }
}

impl<T: Inferencer + ?Sized> Inferencer for Box<T> {
    fn generate(&self, question: &str, documents: &[Document]) -> anyhow::Result<(InferenceMetadata, String)> {
        (**self).generate(question, documents)
    }
}
