use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fandex_core::corpus::read_corpus;
use fandex_core::persist::IndexPaths;
use fandex_core::search;
use fandex_core::tokenizer::Analyzer;
use indexer::{build_and_save, BuildOptions};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a BM25 inverted index from a crawled corpus", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus file (JSON/JSONL) or a directory of them
    Build {
        /// Input corpus path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long, default_value = "./index")]
        output: PathBuf,
        /// Number of indexing worker threads
        #[arg(long, default_value_t = num_cpus::get())]
        workers: usize,
        /// Disable English stemming of terms
        #[arg(long, default_value_t = false)]
        no_stemming: bool,
        /// Run this query against the fresh index as a sanity check
        #[arg(long)]
        query: Option<String>,
        /// Number of results shown for --query
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, workers, no_stemming, query, k } => {
            let load = read_corpus(&input).with_context(|| format!("reading corpus {}", input.display()))?;
            tracing::info!(documents = load.documents.len(), malformed = load.malformed, "corpus loaded");

            let opts = BuildOptions { max_workers: workers, analyzer: Analyzer::new(!no_stemming) };
            let paths = IndexPaths::new(&output);
            let (index, report, _meta) = build_and_save(&load.documents, &opts, &paths)
                .with_context(|| format!("building index into {}", output.display()))?;
            for s in &report.skipped {
                tracing::debug!(position = s.position, url = %s.url, reason = ?s.reason, "skipped");
            }

            if let Some(q) = query {
                let hits = search(&index, &q, k);
                println!("smoke test: {} result(s) for {:?}", hits.len(), q);
                for (rank, hit) in hits.iter().enumerate() {
                    let meta = &index.docs[&hit.doc_id];
                    println!("{:>3}. {:.4}  {}  <{}>", rank + 1, hit.score, meta.title, meta.url);
                }
            }
            Ok(())
        }
    }
}
