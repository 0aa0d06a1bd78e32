use rageval_core::traits::{Embedder, VectorStore};
use rageval_core::types::{Chunk, DocumentChunk};
use rageval_embed::HashEmbedder;
use rageval_vector::{LanceDbIndexer, LanceVectorStore};

const DIM: usize = 64;

fn chunk(doc: &str, index: usize, total: usize, content: &str) -> DocumentChunk {
    DocumentChunk {
        id: format!("{}:{}", doc, index),
        doc_id: doc.to_string(),
        doc_path: format!("/corpus/{}.txt", doc),
        category: "test".to_string(),
        content: content.to_string(),
        chunk_index: index,
        total_chunks: total,
    }
}

fn seed(db_path: &std::path::Path) -> anyhow::Result<()> {
    let chunks = vec![
        chunk("water", 0, 2, "rain barrels collect water from the roof"),
        chunk("water", 1, 2, "filter stored water before drinking"),
        chunk("solar", 0, 1, "solar panels charge the battery bank"),
    ];
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = HashEmbedder::new(DIM).embed_batch(&texts)?;
    let rt = tokio::runtime::Runtime::new()?;
    let indexed = rt.block_on(async {
        let indexer = LanceDbIndexer::new(db_path, "documents").await?;
        indexer.index(&chunks, &embeddings).await
    })?;
    assert_eq!(indexed, 3);
    Ok(())
}

#[test]
fn flat_search_returns_chunks_with_embedding_metadata() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    seed(tmp.path())?;
    let store = LanceVectorStore::open(tmp.path(), "documents", Box::new(HashEmbedder::new(DIM)))?;

    let response = store.search(&Chunk { data: "solar panels charge the battery bank".into() }, 2, false)?;

    assert!(response.status);
    assert_eq!(response.result.len(), 2);
    assert_eq!(response.result[0].text, "solar panels charge the battery bank");
    assert_eq!(response.result[0].doc_id.as_deref(), Some("solar"));
    let meta = response.metadata.embedding_metadata.expect("embedding metadata");
    assert_eq!(meta.dim, DIM);
    assert_eq!(meta.knn, 2);
    assert!(!meta.hierarchical);
    Ok(())
}

#[test]
fn hierarchical_search_returns_whole_parent_documents() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    seed(tmp.path())?;
    let store = LanceVectorStore::open(tmp.path(), "documents", Box::new(HashEmbedder::new(DIM)))?;

    let response = store.search(&Chunk { data: "filter stored water before drinking".into() }, 1, true)?;

    assert_eq!(response.result.len(), 1);
    let parent = &response.result[0];
    assert_eq!(parent.doc_id.as_deref(), Some("water"));
    assert_eq!(parent.text, "rain barrels collect water from the roof\n\nfilter stored water before drinking");
    assert_eq!(parent.extra["chunk_count"], 2);
    Ok(())
}
