use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use wardrobe::cli::commands;
use wardrobe::config::{BuildPolicy, Device, Settings};

#[derive(Parser)]
#[command(name = "wardrobe")]
#[command(about = "Wardrobe - Visual Clothing Recommendations\nFind the closest items in an image gallery for any photo")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), ", courtesy of Kernelle Software"))]
struct Cli {
  /// Path to a YAML config file
  #[arg(long, global = true, env = "WARDROBE_CONFIG")]
  config: Option<PathBuf>,

  /// Directory of gallery source images
  #[arg(long, global = true)]
  source_dir: Option<PathBuf>,

  /// Directory holding the cached gallery
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Hardware for the image encoder
  #[arg(long, global = true, value_enum)]
  device: Option<Device>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Build the gallery cache from the source directory
  Build {
    /// Rebuild even when a valid cache exists
    #[arg(short, long)]
    force: bool,
    /// How to handle source images that fail to encode
    #[arg(long, value_enum)]
    policy: Option<BuildPolicy>,
  },
  /// Find the gallery items most similar to an image
  Recommend {
    /// Query image file
    image: PathBuf,
    /// Number of matches to show
    #[arg(short, long, allow_negative_numbers = true)]
    k: Option<i64>,
    /// Query a running server instead of loading the model locally
    #[arg(long)]
    remote: Option<String>,
  },
  /// List the cached gallery entries
  Gallery,
  /// Print the resolved configuration
  Config,
}

fn init_logging(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("wardrobe=debug,ort=warn,info")
  } else {
    EnvFilter::new("wardrobe=warn,ort=error,error")
  };

  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
  let mut settings = Settings::load(cli.config.as_deref())?;

  if let Some(dir) = &cli.source_dir {
    settings.source_dir = dir.clone();
  }
  if let Some(dir) = &cli.data_dir {
    settings.data_dir = dir.clone();
  }
  if let Some(device) = cli.device {
    settings.device = device;
  }
  if let Command::Build { policy: Some(policy), .. } = &cli.command {
    settings.build_policy = *policy;
  }

  Ok(settings)
}

async fn handle(command: Command, settings: Settings) -> Result<()> {
  match command {
    Command::Build { force, .. } => commands::build_gallery(&settings, force).await,
    Command::Recommend { image, k, remote } => {
      commands::recommend(&settings, &image, k, remote.as_deref()).await
    }
    Command::Gallery => commands::list_gallery(&settings),
    Command::Config => commands::show_config(&settings),
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let settings = resolve_settings(&cli)?;
  handle(cli.command, settings).await
}
