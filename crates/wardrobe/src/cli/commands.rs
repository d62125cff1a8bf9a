use anyhow::{anyhow, Context, Result};
use colored::*;
use std::path::Path;
use std::sync::Arc;

use crate::cli::client::{ClientConfig, RecommendClient};
use crate::cli::display::{display_identifiers, display_matches};
use crate::config::Settings;
use crate::error::RecommendError;
use crate::server::handlers::recommend::resolve_k;
use crate::server::services::encoder::{open_image, ImageEncoder};
use crate::server::services::gallery::GalleryStore;
use crate::server::services::similarity::top_k;
use crate::server::startup::build_encoder;

fn store_for(settings: &Settings) -> GalleryStore {
  GalleryStore::new(&settings.source_dir, settings.cache_paths()).with_policy(settings.build_policy)
}

/// Load the gallery, building it when no usable cache exists
pub async fn build_gallery(settings: &Settings, force: bool) -> Result<()> {
  let encoder = build_encoder(settings).await?;
  let store = store_for(settings);

  let gallery = tokio::task::spawn_blocking(move || {
    if force {
      store.rebuild(encoder.as_ref())
    } else {
      store.load(encoder.as_ref())
    }
  })
  .await
  .map_err(|e| anyhow!("Gallery build task failed: {e}"))??;

  println!(
    "{} Gallery ready: {} entries ({} dimensions) in {}",
    "✓".green(),
    gallery.len().to_string().cyan(),
    gallery.dimension(),
    settings.data_dir.display().to_string().yellow()
  );
  Ok(())
}

/// Rank the gallery against an image, locally or on a remote server
pub async fn recommend(settings: &Settings, image: &Path, k: Option<i64>, remote: Option<&str>) -> Result<()> {
  let matches = match remote {
    Some(url) => {
      let client = RecommendClient::with_config(ClientConfig::for_url(url))?;
      client.recommend(image, k).await?.matches
    }
    None => {
      let encoder = build_encoder(settings).await?;
      recommend_local(settings, encoder, image, resolve_k(k, settings.default_k)).await?
    }
  };

  display_matches(&matches);
  Ok(())
}

/// Run the full pipeline in-process with the given encoder
pub async fn recommend_local(
  settings: &Settings,
  encoder: Arc<dyn ImageEncoder>,
  image: &Path,
  k: usize,
) -> Result<Vec<crate::server::services::similarity::Match>> {
  let store = store_for(settings);
  let image = image.to_path_buf();

  tokio::task::spawn_blocking(move || {
    let gallery = store.load(encoder.as_ref())?;
    let query = encoder.embed(&open_image(&image)?)?;
    top_k(&query, &gallery, k)
  })
  .await
  .map_err(|e| anyhow!("Recommendation task failed: {e}"))?
  .map_err(Into::into)
}

/// List the cached gallery without building anything
pub fn list_gallery(settings: &Settings) -> Result<()> {
  let store = store_for(settings);
  if !store.paths().both_exist() {
    return Err(anyhow!(
      "No cached gallery in {}; run `wardrobe build` first",
      store.paths().dir().display()
    ));
  }

  let gallery = store.load_cached().map_err(|e| match e {
    RecommendError::GalleryInconsistent { .. } => anyhow!("{e}; run `wardrobe build --force` to rebuild"),
    other => other.into(),
  })?;

  display_identifiers(gallery.identifiers(), gallery.dimension());
  Ok(())
}

/// Print the fully resolved settings as YAML
pub fn show_config(settings: &Settings) -> Result<()> {
  let yaml = serde_yaml::to_string(settings).context("Failed to serialize settings")?;
  print!("{yaml}");
  Ok(())
}
