//! Wardrobe REST Server
//!
//! Loads the image encoder and gallery, then serves recommendations over HTTP.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use wardrobe::config::Settings;
use wardrobe::server::startup::{build_encoder, initialize, start_server};

#[derive(Parser)]
#[command(name = "wardrobe_server")]
#[command(about = "Wardrobe REST API Server")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), ", courtesy of Kernelle Software"))]
struct Args {
  /// Server bind address; overrides the configured `bind`
  #[arg(long)]
  bind: Option<SocketAddr>,

  /// Path to a YAML config file
  #[arg(long, env = "WARDROBE_CONFIG")]
  config: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  // ONNX Runtime is chatty at info level
  let filter = if args.verbose {
    EnvFilter::new("debug,ort=warn,hyper=info")
  } else {
    EnvFilter::new("wardrobe=info,wardrobe_server=info,tower_http=info,ort=error,warn")
  };

  tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

  let mut settings = Settings::load(args.config.as_deref())?;
  if let Some(bind) = args.bind {
    settings.bind = bind;
  }

  info!("Starting Wardrobe REST Server v{}", env!("CARGO_PKG_VERSION"));
  info!("Gallery source: {}, cache: {}", settings.source_dir.display(), settings.data_dir.display());

  let addr = settings.bind;
  let encoder = build_encoder(&settings).await?;
  let state = initialize(settings, encoder).await?;

  start_server(addr, state).await
}
