use anyhow::Result;
use clap::{Parser, ValueEnum};
use search::{render_text, Searcher};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "search")]
#[command(about = "Query a fandex index and print the top results")]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Number of results to show
    #[arg(long, default_value_t = 10)]
    k: usize,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
    /// Query words
    #[arg(required = true, trailing_var_arg = true)]
    query: Vec<String>,
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let searcher = Searcher::open(&args.index)?;
    let query = args.query.join(" ");
    let resp = searcher.search(&query, args.k);
    match args.format {
        Format::Text => print!("{}", render_text(&resp)),
        Format::Json => println!("{}", serde_json::to_string_pretty(&resp)?),
    }
    Ok(())
}
