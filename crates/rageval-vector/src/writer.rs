use anyhow::{Result, ensure};
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::{connect, Connection};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::schema::build_arrow_schema;
use rageval_core::types::DocumentChunk;

const BATCH_SIZE: usize = 1000;

pub struct LanceDbIndexer { pub(crate) db: Connection, pub(crate) table_name: String }

impl LanceDbIndexer {
	pub async fn new(db_path: &Path, table_name: &str) -> Result<Self> {
		let db = connect(db_path.to_string_lossy().as_ref()).execute().await?;
		Ok(Self { db, table_name: table_name.to_string() })
	}

	/// Append chunks with their embeddings, creating the table on first write.
	pub async fn index(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
		if chunks.is_empty() { info!("no chunks to index"); return Ok(0); }
		ensure!(chunks.len() == embeddings.len(), "chunks ({}) and embeddings ({}) length must match", chunks.len(), embeddings.len());
		let dim = embeddings[0].len();
		ensure!(embeddings.iter().all(|e| e.len() == dim), "embeddings must share one dimensionality");
		info!(chunks = chunks.len(), table = %self.table_name, dim, "indexing into LanceDB");
		let pb = ProgressBar::new(chunks.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
		let mut processed = 0usize;
		for (batch_chunks, batch_embeddings) in chunks.chunks(BATCH_SIZE).zip(embeddings.chunks(BATCH_SIZE)) {
			self.insert_batch(batch_chunks, batch_embeddings, dim).await?;
			processed += batch_chunks.len();
			pb.set_position(processed as u64);
			debug!(processed, "inserted batch");
		}
		pb.finish_with_message("done");
		info!(processed, "LanceDB indexing completed");
		Ok(processed)
	}

	async fn insert_batch(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>], dim: usize) -> Result<()> {
		let record_batch = to_record_batch(chunks, embeddings, dim)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if self.db.table_names().execute().await?.contains(&self.table_name) {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}
}

fn to_record_batch(chunks: &[DocumentChunk], embeddings: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
	let dim = i32::try_from(dim)?;
	let schema = build_arrow_schema(dim);
	let vectors: Vec<Option<Vec<Option<f32>>>> = embeddings.iter().map(|e| Some(e.iter().map(|&x| Some(x)).collect())).collect();
	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.id.as_str()))),
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.doc_id.as_str()))),
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.doc_path.as_str()))),
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.category.as_str()))),
		Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.content.as_str()))),
		Arc::new(Int32Array::from_iter_values(chunks.iter().map(|c| c.chunk_index as i32))),
		Arc::new(Int32Array::from_iter_values(chunks.iter().map(|c| c.total_chunks as i32))),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
	])?;
	Ok(record_batch)
}
