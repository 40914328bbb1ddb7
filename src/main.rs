//! Service entry point.

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tldw::config::Config;
use tldw::http::{AppState, serve};

#[derive(Parser, Debug)]
#[command(name = "tldw", about = "Transcript-based video summarization service")]
struct Args {
    /// Bind host (overrides HOST).
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides PORT).
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    let state = AppState::from_config(&config);
    serve(state, addr).await
}
