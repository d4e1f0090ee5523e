use anyhow::Result;
use axum::Router;
use clap::Parser;
use server::{build_app, EngineOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// Links file (nodeID;out1,out2,...), enables HITS
    #[arg(long, requires = "titles")]
    links: Option<PathBuf>,
    /// Titles file (nodeID;title)
    #[arg(long, requires = "links")]
    titles: Option<PathBuf>,
    /// PageRank score file, enables PAGERANK and COMBINATION ranking
    #[arg(long)]
    pagerank: Option<PathBuf>,
    /// JSON ranking config
    #[arg(long)]
    config: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let options = EngineOptions {
        index_dir: args.index,
        links: args.links,
        titles: args.titles,
        pagerank: args.pagerank,
        config: args.config,
    };
    let app: Router = build_app(options)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
