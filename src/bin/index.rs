//! Offline indexing entry point.
//!
//! Reads a JSON corpus (the flat article records produced by the site's
//! content-loading step), embeds every document with the configured
//! provider, and upserts the chunks into the vector store. Exits non-zero
//! only on catastrophic failure; per-document failures are reported and
//! leave the exit code at zero.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use docsearch::chunking::FixedSizeChunker;
use docsearch::{Document, Indexer, ProviderKind, SearchConfig};

#[derive(Parser, Debug)]
#[command(name = "docsearch-index", about = "Embed and index a documentation corpus")]
struct Args {
    /// Path to the corpus: a JSON array of articles
    /// ({slug, title, folder, tags, body}).
    #[arg(long)]
    corpus: PathBuf,

    /// Embedding provider (local | gemini | openai); overrides
    /// DOCSEARCH_PROVIDER.
    #[arg(long)]
    provider: Option<ProviderKind>,

    /// Embedding batch size (clamped to 8..=32).
    #[arg(long)]
    batch_size: Option<usize>,

    /// Keep slugs that are no longer in the corpus.
    #[arg(long)]
    no_prune: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut config = SearchConfig::from_env()?;
    if let Some(kind) = args.provider {
        config.provider = kind;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    let raw = std::fs::read_to_string(&args.corpus)
        .with_context(|| format!("reading corpus {}", args.corpus.display()))?;
    let documents: Vec<Document> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing corpus {}", args.corpus.display()))?;

    let provider = config.build_provider()?;
    let store = config.build_index_store(provider.dimensions()).await?;

    let report = Indexer::new(provider, store)
        .with_chunker(Box::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)))
        .with_batch_size(config.batch_size)
        .with_prune(!args.no_prune)
        .index_all(&documents)
        .await?;

    println!("{report}");
    if report.has_failures() {
        warn!(failed = report.failed.len(), "indexing completed with per-document failures");
    }
    Ok(())
}
