use anyhow::{Result, anyhow, ensure};
use arrow_array::{Array, Float32Array, Int32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::path::Path;
use std::time::Instant;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::hierarchy::{assemble_parent, candidate_limit, select_parents, ChunkHit};
use rageval_core::traits::{Embedder, VectorStore};
use rageval_core::types::{Chunk, Document, EmbeddingMetadata, SearchMetadata, SearchResponse};

/// Nearest-neighbour search over a LanceDB documents table.
///
/// The retriever is synchronous, so the store owns a Tokio runtime and
/// blocks on LanceDB internally.
pub struct LanceVectorStore { runtime: Runtime, db: Connection, table_name: String, embedder: Box<dyn Embedder> }

impl LanceVectorStore {
	pub fn open(db_path: &Path, table_name: &str, embedder: Box<dyn Embedder>) -> Result<Self> {
		let runtime = Runtime::new()?;
		let db = runtime.block_on(async { connect(db_path.to_string_lossy().as_ref()).execute().await })?;
		Ok(Self { runtime, db, table_name: table_name.to_string(), embedder })
	}

	async fn nearest(&self, query_vec: Vec<f32>, limit: usize) -> Result<Vec<ChunkHit>> {
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut stream = table.vector_search(query_vec)?.limit(limit).execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? { hits.extend(read_hits(&batch)?); }
		hits.sort_by(|a, b| b.score.total_cmp(&a.score));
		Ok(hits)
	}

	async fn siblings(&self, doc_id: &str) -> Result<Vec<ChunkHit>> {
		let table = self.db.open_table(&self.table_name).execute().await?;
		let mut stream = table.query().only_if(format!("doc_id = '{}'", doc_id.replace('\'', "''"))).execute().await?;
		let mut out = Vec::new();
		while let Some(batch) = stream.try_next().await? { out.extend(read_hits(&batch)?); }
		Ok(out)
	}

	async fn search_async(&self, query_vec: Vec<f32>, k: usize, hierarchical: bool) -> Result<Vec<Document>> {
		if !hierarchical {
			let hits = self.nearest(query_vec, k).await?;
			return Ok(hits.into_iter().take(k).map(ChunkHit::into_document).collect());
		}
		let hits = self.nearest(query_vec, candidate_limit(k)).await?;
		let mut parents = Vec::new();
		for parent in select_parents(&hits, k) {
			let siblings = self.siblings(&parent.doc_id).await?;
			parents.push(assemble_parent(parent, siblings));
		}
		Ok(parents)
	}
}

impl VectorStore for LanceVectorStore {
	fn search(&self, chunk: &Chunk, k: usize, hierarchical: bool) -> Result<SearchResponse> {
		ensure!(k > 0, "k must be at least 1");
		let started = Instant::now();
		let query_vec = self.embedder
			.embed_batch(std::slice::from_ref(&chunk.data))?
			.pop()
			.ok_or_else(|| anyhow!("embedder returned no vector for query"))?;
		let embedding_metadata = EmbeddingMetadata {
			embedder_id: self.embedder.id().to_string(),
			dim: query_vec.len(),
			input_chars: chunk.data.chars().count(),
			latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
			knn: k,
			hierarchical,
		};
		let documents = self.runtime.block_on(self.search_async(query_vec, k, hierarchical))?;
		debug!(k, hierarchical, documents = documents.len(), "lance search");
		Ok(SearchResponse::ok(documents, SearchMetadata { embedding_metadata: Some(embedding_metadata), ..SearchMetadata::default() }))
	}
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("column '{}' missing or not utf8", name))
}

fn read_hits(batch: &RecordBatch) -> Result<Vec<ChunkHit>> {
	let ids = string_col(batch, "id")?;
	let doc_ids = string_col(batch, "doc_id")?;
	let paths = string_col(batch, "doc_path")?;
	let categories = string_col(batch, "category")?;
	let contents = string_col(batch, "content")?;
	let chunk_indices = batch.column_by_name("chunk_index").and_then(|c| c.as_any().downcast_ref::<Int32Array>()).ok_or_else(|| anyhow!("column 'chunk_index' missing"))?;
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
	let mut hits = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		// plain scans carry no distance column
		let score = distances.filter(|d| !d.is_null(i)).map_or(0.0, |d| 1.0 - d.value(i));
		hits.push(ChunkHit {
			id: ids.value(i).to_string(),
			doc_id: doc_ids.value(i).to_string(),
			doc_path: paths.value(i).to_string(),
			category: categories.value(i).to_string(),
			content: contents.value(i).to_string(),
			chunk_index: usize::try_from(chunk_indices.value(i)).unwrap_or(0),
			score,
		});
	}
	Ok(hits)
}
