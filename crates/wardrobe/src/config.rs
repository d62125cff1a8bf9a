//! Runtime settings for the recommendation service and CLI
//!
//! Settings resolve in layers: built-in defaults, then an optional YAML file,
//! then `WARDROBE_*` environment overrides. Binaries apply their own command
//! line flags on top of the result.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL_REPO: &str = "Xenova/clip-vit-base-patch32";
pub const DEFAULT_MODEL_FILE: &str = "onnx/vision_model.onnx";

const EMBEDDINGS_FILE: &str = "gallery_embeddings.bin";
const IDENTIFIERS_FILE: &str = "gallery_paths.txt";

/// Hardware the encoder session should run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Device {
  #[default]
  Auto,
  Cpu,
  Cuda,
  Coreml,
}

/// What the gallery builder does when a single source image fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildPolicy {
  /// Any failing image aborts the whole build
  #[default]
  Abort,
  /// Failing images are logged and left out of the gallery
  Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
  /// Flat directory holding the gallery source images
  pub source_dir: PathBuf,
  /// Directory holding the persisted gallery artifacts
  pub data_dir: PathBuf,
  /// Number of matches returned when a request does not pass `k`
  pub default_k: usize,
  pub device: Device,
  /// Local ONNX vision model; downloaded from `model_repo` when unset
  pub model_path: Option<PathBuf>,
  pub model_repo: String,
  pub model_file: String,
  pub bind: SocketAddr,
  /// Upload decodes allowed in flight at once. Encodes share one model session
  /// and run one at a time, so beyond decoding these permits only bound how
  /// many requests wait on the encoder. Also sets the encoder's intra-op threads.
  pub encoder_workers: usize,
  pub encode_timeout_secs: Option<u64>,
  pub max_upload_bytes: usize,
  pub build_policy: BuildPolicy,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      source_dir: PathBuf::from("samples"),
      data_dir: PathBuf::from("data"),
      default_k: 3,
      device: Device::Auto,
      model_path: None,
      model_repo: DEFAULT_MODEL_REPO.to_string(),
      model_file: DEFAULT_MODEL_FILE.to_string(),
      bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
      encoder_workers: 2,
      encode_timeout_secs: None,
      max_upload_bytes: 10 * 1024 * 1024,
      build_policy: BuildPolicy::Abort,
    }
  }
}

impl Settings {
  /// Resolve settings from an explicit file, `WARDROBE_CONFIG`, or the user config dir
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let settings = match config_file(explicit) {
      Some(path) => Self::from_file(&path)?,
      None => Self::default(),
    };

    settings.with_env_overrides()
  }

  pub fn from_file(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file {}", path.display()))?;
    Self::from_yaml(&content).with_context(|| format!("Invalid config file {}", path.display()))
  }

  pub fn from_yaml(content: &str) -> Result<Self> {
    if content.trim().is_empty() {
      return Ok(Self::default());
    }
    let settings: Settings = serde_yaml::from_str(content)?;
    settings.validate()?;
    Ok(settings)
  }

  fn with_env_overrides(mut self) -> Result<Self> {
    if let Ok(dir) = std::env::var("WARDROBE_SOURCE_DIR") {
      self.source_dir = PathBuf::from(dir);
    }
    if let Ok(dir) = std::env::var("WARDROBE_DATA_DIR") {
      self.data_dir = PathBuf::from(dir);
    }
    if let Ok(k) = std::env::var("WARDROBE_DEFAULT_K") {
      self.default_k = k.parse().map_err(|_| anyhow!("WARDROBE_DEFAULT_K must be an integer: {k}"))?;
    }
    if let Ok(device) = std::env::var("WARDROBE_DEVICE") {
      self.device = Device::from_str(&device, true)
        .map_err(|_| anyhow!("WARDROBE_DEVICE must be one of auto, cpu, cuda, coreml: {device}"))?;
    }
    if let Ok(path) = std::env::var("WARDROBE_MODEL_PATH") {
      self.model_path = Some(PathBuf::from(path));
    }

    self.validate()?;
    Ok(self)
  }

  pub fn validate(&self) -> Result<()> {
    if self.encoder_workers == 0 {
      return Err(anyhow!("encoder_workers must be at least 1"));
    }
    if self.max_upload_bytes == 0 {
      return Err(anyhow!("max_upload_bytes must be greater than zero"));
    }
    Ok(())
  }

  pub fn cache_paths(&self) -> CachePaths {
    CachePaths::in_dir(&self.data_dir)
  }
}

fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }
  if let Ok(path) = std::env::var("WARDROBE_CONFIG") {
    return Some(PathBuf::from(path));
  }

  dirs::config_dir().map(|dir| dir.join("wardrobe").join("config.yaml")).filter(|p| p.exists())
}

/// Locations of the persisted gallery artifact pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
  pub embeddings: PathBuf,
  pub identifiers: PathBuf,
}

impl CachePaths {
  pub fn in_dir(dir: &Path) -> Self {
    Self { embeddings: dir.join(EMBEDDINGS_FILE), identifiers: dir.join(IDENTIFIERS_FILE) }
  }

  /// Directory the artifacts live in
  pub fn dir(&self) -> &Path {
    self.embeddings.parent().unwrap_or_else(|| Path::new("."))
  }

  pub fn both_exist(&self) -> bool {
    self.embeddings.is_file() && self.identifiers.is_file()
  }
}
