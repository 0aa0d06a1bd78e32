use std::{env, fs, path::Path};

use rageval_cli::{build_retriever, RunSummary};
use rageval_core::config::{expand_path, Config};
use rageval_embed::get_default_embedder;

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} [questions.json] [--knn N] [--hierarchical] [--no-rerank] [--output PATH]", prog);
    std::process::exit(1)
}

fn main() -> anyhow::Result<()> {
    rageval_cli::init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = config.settings()?;
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    let mut rerank = true;
    let mut i = 0; while i < args.len() { match args[i].as_str() {
        "--knn" => { match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) { Some(k) => { settings.retriever.knn = k; i += 1; } None => { eprintln!("Error: --knn requires a number"); usage(&prog) } } }
        "--output" | "-o" => { match args.get(i + 1) { Some(p) => { settings.retriever.output_path = Some(p.clone()); i += 1; } None => usage(&prog) } }
        "--hierarchical" => settings.retriever.hierarchical = true,
        "--no-rerank" => rerank = false,
        "--help" | "-h" => usage(&prog),
        _ if !args[i].starts_with('-') => settings.retriever.questions_path = args[i].clone(),
        _ => usage(&prog) } i += 1; }
    settings.validate()?;

    let questions_path = expand_path(&settings.retriever.questions_path);
    let db_path = expand_path(&settings.data.lancedb_dir);
    eprintln!("🔍 rageval retrieve: {} (knn={}, hierarchical={}, rerank={})", questions_path.display(), settings.retriever.knn, settings.retriever.hierarchical, rerank && settings.rerank.enabled);

    let retriever = build_retriever(&settings, &db_path, get_default_embedder()?, rerank)?;
    let items = retriever.retrieve(&questions_path, &settings.retriever.query, settings.retriever.knn, settings.retriever.hierarchical)?;
    let json = serde_json::to_string_pretty(&items)?;
    match settings.retriever.output_path.as_deref().map(expand_path) {
        Some(out) => { write_output(&out, &json)?; eprintln!("📝 Wrote {}", out.display()); }
        None => println!("{}", json),
    }
    let summary = RunSummary::from_items(&items);
    eprintln!("✅ {} items, {} blocked, {} without context", summary.items, summary.blocked, summary.empty_context);
    Ok(())
}

fn write_output(path: &Path, json: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) { fs::create_dir_all(parent)?; }
    fs::write(path, json)?;
    Ok(())
}
