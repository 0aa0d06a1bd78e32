//! rageval-retriever
//!
//! Batch question answering over a vector store: search, optional rerank,
//! generation, and reshaping of every collaborator's metadata into one
//! `RetrieverItem` per question.

use anyhow::Result;
use std::path::Path;
use tracing::{debug, info};

use rageval_core::error::Error;
use rageval_core::traits::{Inferencer, QuestionSource, Reranker, VectorStore};
use rageval_core::types::{Document, InferenceMetadata, Metadata, Question, RetrieverItem};

pub mod guardrail;
pub mod inference;
pub mod rerank;

pub struct Retriever {
    source: Box<dyn QuestionSource>,
    store: Box<dyn VectorStore>,
    inferencer: Box<dyn Inferencer>,
    reranker: Option<Box<dyn Reranker>>,
}

impl Retriever {
    pub fn new(source: Box<dyn QuestionSource>, store: Box<dyn VectorStore>, inferencer: Box<dyn Inferencer>) -> Self {
        Self { source, store, inferencer, reranker: None }
    }

    pub fn with_reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Answer every question in `path`, in file order.
    ///
    /// `_query` is accepted for call-site compatibility and ignored: each
    /// question's own text drives its search. The first collaborator error
    /// aborts the batch.
    pub fn retrieve(&self, path: &Path, _query: &str, knn: usize, hierarchical: bool) -> Result<Vec<RetrieverItem>> {
        if knn == 0 {
            return Err(Error::InvalidConfig("knn must be at least 1".into()).into());
        }
        let questions = self.source.read_all(path)?;
        info!(path = %path.display(), questions = questions.len(), knn, hierarchical, "retrieving");
        let mut items = Vec::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            let item = self.answer(question, knn, hierarchical)?;
            debug!(index, blocked = item.guardrails_blocked, contexts = item.reference_contexts.len(), "answered question");
            items.push(item);
        }
        info!(items = items.len(), blocked = items.iter().filter(|i| i.guardrails_blocked).count(), "retrieval finished");
        Ok(items)
    }

    fn answer(&self, question: &Question, knn: usize, hierarchical: bool) -> Result<RetrieverItem> {
        let chunk = question.chunk();
        let response = self.store.search(&chunk, knn, hierarchical)?;

        let (documents, metadata, answer, blocked, answer_metadata) = if response.status {
            let documents = match &self.reranker {
                Some(reranker) => reranker.rerank(&chunk.data, response.result.clone())?,
                None => response.result.clone(),
            };
            let (metadata, answer) = self.inferencer.generate(&question.question, &documents)?;
            let blocked = metadata.guardrail_blocked();
            let answer_metadata = metadata.to_map();
            (documents, metadata, answer, blocked, answer_metadata)
        } else {
            let answer = response.metadata.guardrail_output().ok_or(Error::MissingField("guardrail_output"))?.to_string();
            let blocked = response.metadata.guardrail_blocked();
            (response.result.clone(), InferenceMetadata::default(), answer, blocked, Metadata::new())
        };

        Ok(RetrieverItem {
            question: question.question.clone(),
            answer,
            guardrails_output_assessment: metadata.output_assessment(),
            guardrails_context_assessment: response.metadata.context_assessment(),
            guardrails_input_assessment: response.metadata.input_assessment(),
            guardrails_blocked: blocked,
            answer_metadata,
            query_metadata: response.metadata.query_metadata(),
            reference_contexts: reference_contexts(&documents),
            gt_answer: question.answer.clone(),
        })
    }
}

fn reference_contexts(documents: &[Document]) -> Vec<String> {
    documents.iter().map(|d| d.text.clone()).collect()
}
