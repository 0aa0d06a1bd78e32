//! Wiring shared by the `rageval-*` binaries.

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use rageval_core::config::{InferencerKind, Settings};
use rageval_core::reader::JsonReader;
use rageval_core::traits::{Embedder, Inferencer, VectorStore};
use rageval_core::types::RetrieverItem;
use rageval_retriever::guardrail::{GuardedInferencer, GuardedVectorStore, KeywordGuardrail};
use rageval_retriever::inference::{ChatInferencer, ExtractiveInferencer};
use rageval_retriever::rerank::LexicalReranker;
use rageval_retriever::Retriever;
use rageval_vector::LanceVectorStore;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

pub fn build_inferencer(settings: &Settings) -> Result<Box<dyn Inferencer>> {
    let inner: Box<dyn Inferencer> = match settings.inferencer.kind {
        InferencerKind::Extractive => Box::new(ExtractiveInferencer),
        InferencerKind::Chat => Box::new(ChatInferencer::from_settings(&settings.inferencer)?),
    };
    let guard = &settings.guardrail;
    if guard.enabled && guard.check_output {
        return Ok(Box::new(GuardedInferencer::new(inner, Box::new(KeywordGuardrail::from_settings(guard)))));
    }
    Ok(inner)
}

pub fn guard_store(settings: &Settings, store: Box<dyn VectorStore>) -> Box<dyn VectorStore> {
    let guard = &settings.guardrail;
    if guard.enabled && (guard.check_input || guard.check_context) {
        let guarded = GuardedVectorStore::new(store, Box::new(KeywordGuardrail::from_settings(guard)))
            .with_checks(guard.check_input, guard.check_context);
        return Box::new(guarded);
    }
    store
}

/// Retriever over the LanceDB table named in `[data]`, with reranking and
/// guardrails as configured.
pub fn build_retriever(settings: &Settings, db_path: &Path, embedder: Box<dyn Embedder>, rerank: bool) -> Result<Retriever> {
    let store = LanceVectorStore::open(db_path, &settings.data.table, embedder)?;
    let store = guard_store(settings, Box::new(store));
    let retriever = Retriever::new(Box::new(JsonReader::new()), store, build_inferencer(settings)?);
    if rerank && settings.rerank.enabled {
        return Ok(retriever.with_reranker(Box::new(LexicalReranker::from_settings(&settings.rerank))));
    }
    Ok(retriever)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub items: usize,
    pub blocked: usize,
    pub empty_context: usize,
}

impl RunSummary {
    pub fn from_items(items: &[RetrieverItem]) -> Self {
        Self {
            items: items.len(),
            blocked: items.iter().filter(|i| i.guardrails_blocked).count(),
            empty_context: items.iter().filter(|i| i.reference_contexts.is_empty()).count(),
        }
    }
}
