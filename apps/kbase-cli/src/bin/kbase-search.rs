use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use kbase_cli::{init_tracing, load_settings};
use kbase_embed::LocalEmbedderLoader;
use kbase_engine::RetrievalEngine;

const PREVIEW_CHARS: usize = 200;

/// Query a built knowledge base index.
#[derive(Debug, Parser)]
#[command(name = "kbase-search", version)]
struct Args {
    /// Search text
    query: Option<String>,

    /// Number of results (defaults to `search.default_k`)
    #[arg(short, long)]
    k: Option<usize>,

    /// Only keep results from this category
    #[arg(long)]
    category: Option<String>,

    /// Index directory (defaults to `data.index_dir`)
    #[arg(long)]
    index: Option<PathBuf>,

    /// Print index statistics as JSON
    #[arg(long)]
    stats: bool,

    /// List categories
    #[arg(long)]
    categories: bool,
}

fn main() -> ExitCode {
    init_tracing();
    match run(Args::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let settings = load_settings(None, args.index)?;
    let loader = LocalEmbedderLoader::from_settings(&settings.embedding);
    let engine = RetrievalEngine::open(&settings.data.index_dir, Box::new(loader));

    if args.stats {
        println!("{}", serde_json::to_string_pretty(&engine.get_stats())?);
    }
    if args.categories {
        for category in engine.get_categories() {
            println!("{}", category);
        }
    }
    let Some(query) = args.query else {
        if args.stats || args.categories {
            return Ok(ExitCode::SUCCESS);
        }
        eprintln!("Usage: kbase-search <query> [-k N] [--category NAME]");
        return Ok(ExitCode::FAILURE);
    };
    if !engine.is_ready() {
        tracing::warn!(mode = %engine.mode(), "index not ready; results come from a plain text scan");
    }

    let k = args.k.unwrap_or(settings.search.default_k);
    let results = engine.search(&query, k, args.category.as_deref());
    if results.is_empty() {
        println!("No results for \"{}\"", query);
        return Ok(ExitCode::SUCCESS);
    }
    for (rank, result) in results.iter().enumerate() {
        let chunk = &result.chunk;
        let preview: String = chunk.text.chars().take(PREVIEW_CHARS).collect();
        println!("{}. [{:.3}] {} ({}, chunk {})", rank + 1, result.search_score, chunk.title, chunk.category, chunk.chunk_index);
        println!("   {}", chunk.relative_path);
        println!("   {}", preview.replace('\n', " "));
    }
    Ok(ExitCode::SUCCESS)
}
