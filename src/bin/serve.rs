//! Search API entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docsearch::{QueryEngine, SearchConfig};

#[derive(Parser, Debug)]
#[command(name = "docsearch-serve", about = "Serve the documentation search API")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = SearchConfig::from_env()?;

    let provider = config.build_provider()?;
    let store = config.build_query_store(provider.dimensions()).await?;
    let engine = Arc::new(QueryEngine::new(provider, store)?);

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .with_context(|| format!("binding {}", args.addr))?;
    info!(addr = %args.addr, provider = %config.provider, "search API listening");

    axum::serve(listener, docsearch::server::router(engine, config.top_k))
        .await
        .context("serving search API")?;
    Ok(())
}
