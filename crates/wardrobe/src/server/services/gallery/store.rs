use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{info, warn};

use super::artifacts::{read_pair, write_pair};
use super::builder::GalleryBuilder;
use super::Gallery;
use crate::config::{BuildPolicy, CachePaths};
use crate::error::{RecommendError, RecommendResult};
use crate::server::services::encoder::ImageEncoder;

/// Loads the gallery from its cached artifacts, building it when the cache is unusable
#[derive(Debug, Clone)]
pub struct GalleryStore {
  source_dir: PathBuf,
  paths: CachePaths,
  policy: BuildPolicy,
}

impl GalleryStore {
  pub fn new(source_dir: impl Into<PathBuf>, paths: CachePaths) -> Self {
    Self { source_dir: source_dir.into(), paths, policy: BuildPolicy::Abort }
  }

  pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn paths(&self) -> &CachePaths {
    &self.paths
  }

  /// Return the cached gallery when it is complete and matches the encoder.
  ///
  /// Missing, torn, or stale artifacts fall through to a fresh build, which is
  /// persisted before being returned.
  pub fn load(&self, encoder: &dyn ImageEncoder) -> RecommendResult<Gallery> {
    if !self.paths.both_exist() {
      info!("No cached gallery in {}, building from {}", self.paths.dir().display(), self.source_dir.display());
      return self.rebuild(encoder);
    }

    match self.load_cached().and_then(|gallery| check_dimension(gallery, encoder.dimension())) {
      Ok(gallery) => {
        info!("Loaded cached gallery: {} entries", gallery.len());
        Ok(gallery)
      }
      Err(e) if e.invalidates_cache() => {
        warn!("Cached gallery unusable ({e}), rebuilding");
        self.rebuild(encoder)
      }
      Err(e) => Err(e),
    }
  }

  /// Read the cached artifacts without any fallback
  pub fn load_cached(&self) -> RecommendResult<Gallery> {
    read_pair(&self.paths)
  }

  /// Build from the source directory and persist, replacing any cached pair
  pub fn rebuild(&self, encoder: &dyn ImageEncoder) -> RecommendResult<Gallery> {
    let gallery = GalleryBuilder::new(encoder).with_policy(self.policy).build(&self.source_dir)?;
    write_pair(&gallery, &self.paths)?;
    info!("Gallery cached in {}", self.paths.dir().display());
    Ok(gallery)
  }

  /// When the cached matrix was last written, if it exists
  pub fn cached_at(&self) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(&self.paths.embeddings).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
  }
}

fn check_dimension(gallery: Gallery, expected: usize) -> RecommendResult<Gallery> {
  if !gallery.is_empty() && gallery.dimension() != expected {
    return Err(RecommendError::DimensionMismatch { expected, actual: gallery.dimension() });
  }
  Ok(gallery)
}
