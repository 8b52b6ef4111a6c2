use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use kbase_build::{BuildError, Builder};
use kbase_cli::{init_tracing, load_settings};
use kbase_core::config::BuildStrategy;
use kbase_core::source::FsDocumentSource;
use kbase_embed::LocalEmbedderLoader;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Streaming,
    Checkpointed,
    Lexical,
}

impl From<StrategyArg> for BuildStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Streaming => BuildStrategy::Streaming,
            StrategyArg::Checkpointed => BuildStrategy::Checkpointed,
            StrategyArg::Lexical => BuildStrategy::Lexical,
        }
    }
}

/// Build the knowledge base index from a directory of documents.
#[derive(Debug, Parser)]
#[command(name = "kbase-build", version)]
struct Args {
    /// Directory of source documents (defaults to `data.source_dir`)
    #[arg(long)]
    source: Option<PathBuf>,

    /// Index output directory (defaults to `data.index_dir`)
    #[arg(long)]
    index: Option<PathBuf>,

    /// Strategies to try in order; repeat to give several
    #[arg(long = "strategy", value_enum)]
    strategies: Vec<StrategyArg>,

    /// Stop after this many new files and keep a checkpoint for the next run
    #[arg(long)]
    max_files: Option<usize>,

    /// Hide the progress bar
    #[arg(long)]
    quiet: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut settings = load_settings(args.source, args.index)?;
    if !args.strategies.is_empty() {
        settings.build.strategies = args.strategies.into_iter().map(BuildStrategy::from).collect();
    }
    let source = FsDocumentSource::new(&settings.data.source_dir, settings.categories.clone());
    let loader = LocalEmbedderLoader::from_settings(&settings.embedding);

    let mut builder = Builder::new(&settings, &source, &loader).with_progress(!args.quiet);
    if let Some(limit) = args.max_files {
        builder = builder.with_file_limit(limit);
    }

    match builder.run() {
        Ok(report) => {
            println!("Knowledge base built with the {} strategy ({} mode)", report.strategy, report.mode);
            println!("  documents:  {}", report.documents);
            println!("  chunks:     {}", report.chunks);
            println!("  categories: {}", report.categories.join(", "));
            if report.skipped_files > 0 {
                println!("  skipped:    {}", report.skipped_files);
            }
            if report.resumed_files > 0 {
                println!("  resumed:    {} files from checkpoint", report.resumed_files);
            }
            println!("  index:      {}", settings.data.index_dir.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(BuildError::Paused { processed, remaining }) => {
            println!("Paused after {} files, {} remaining. Run again to continue.", processed, remaining);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
