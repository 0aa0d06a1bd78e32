use std::{env, fs, path::PathBuf};

use rageval_core::config::{expand_path, Config};
use rageval_core::data_processor::DataProcessor;
use rageval_embed::get_default_embedder;
use rageval_vector::LanceDbIndexer;
use tracing::info;

fn main() -> anyhow::Result<()> {
    rageval_cli::init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let args: Vec<String> = env::args().skip(1).collect();
    let mut data_dir = None; let mut limit = None; let mut keep_existing = false;
    let mut i = 0; while i < args.len() { match args[i].as_str() {
        "--limit" => { match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) { Some(l) => { limit = Some(l); i += 1; } None => { eprintln!("Error: --limit requires a number"); std::process::exit(1); } } }
        "--append" => keep_existing = true,
        _ if !args[i].starts_with('-') => data_dir = Some(PathBuf::from(&args[i])),
        other => { eprintln!("Unknown flag: {}", other); std::process::exit(1); } } i += 1; }
    let data_dir = data_dir.unwrap_or_else(|| expand_path(&settings.data.raw_txt_dir));
    let lancedb_path = expand_path(&settings.data.lancedb_dir);
    println!("rageval ingest\n==============");
    println!("Data directory: {}", data_dir.display());
    println!("LanceDB: {} (table {})", lancedb_path.display(), settings.data.table);

    let chunks = DataProcessor::new().process_directory_limited(&data_dir, limit)?;
    if chunks.is_empty() { println!("Nothing to index."); return Ok(()); }
    if !keep_existing && lancedb_path.exists() { fs::remove_dir_all(&lancedb_path)?; }
    fs::create_dir_all(&lancedb_path)?;

    let embedder = get_default_embedder()?;
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let embeddings = embedder.embed_batch(&texts)?;
    info!(embedder = embedder.id(), chunks = chunks.len(), "embedded corpus");
    let indexed = tokio::runtime::Runtime::new()?.block_on(async {
        let indexer = LanceDbIndexer::new(&lancedb_path, &settings.data.table).await?;
        indexer.index(&chunks, &embeddings).await
    })?;
    println!("\n✅ Indexed {} chunks", indexed);
    println!("💡 To evaluate, use: cargo run --bin rageval-retrieve -- <questions.json>");
    Ok(())
}
