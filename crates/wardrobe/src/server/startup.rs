//! Server startup: encoder, gallery, and listener

use anyhow::{anyhow, Context, Result};
use axum::serve;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Settings;
use crate::server::routing::create_router;
use crate::server::services::encoder::ImageEncoder;
use crate::server::services::gallery::{Gallery, GalleryStore};
use crate::server::state::AppState;

/// Create the encoder configured by `settings`
#[cfg(feature = "ml-features")]
pub async fn build_encoder(settings: &Settings) -> Result<Arc<dyn ImageEncoder>> {
  use crate::server::services::encoder::clip::ClipImageEncoder;

  let encoder = ClipImageEncoder::load(settings).await.context("Failed to initialize image encoder")?;
  info!("Image encoder ready: {} ({} dimensions)", encoder.model_id(), encoder.dimension());
  Ok(Arc::new(encoder))
}

/// Create the encoder configured by `settings`
#[cfg(not(feature = "ml-features"))]
pub async fn build_encoder(_settings: &Settings) -> Result<Arc<dyn ImageEncoder>> {
  Err(anyhow!(
    "This build has no neural image encoder; rebuild with --features ml-features"
  ))
}

/// Load or build the gallery for `settings` using `encoder`
pub async fn load_gallery(settings: &Settings, encoder: Arc<dyn ImageEncoder>) -> Result<Gallery> {
  let store = GalleryStore::new(&settings.source_dir, settings.cache_paths()).with_policy(settings.build_policy);

  tokio::task::spawn_blocking(move || store.load(encoder.as_ref()))
    .await
    .map_err(|e| anyhow!("Gallery load task failed: {e}"))?
    .context("Failed to load gallery")
}

/// Prepare everything a request needs, before any listener is bound
pub async fn initialize(settings: Settings, encoder: Arc<dyn ImageEncoder>) -> Result<AppState> {
  let gallery = load_gallery(&settings, Arc::clone(&encoder)).await?;
  info!("Gallery ready: {} entries, dimension {}", gallery.len(), gallery.dimension());

  Ok(AppState::new(settings, encoder, gallery))
}

/// Start the REST server
pub async fn start_server(addr: SocketAddr, state: AppState) -> Result<()> {
  info!("Starting wardrobe REST server on {addr}");

  let app = create_router(state);

  let listener = TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
  info!("Server listening on {addr}");

  serve(listener, app).await.map_err(|e| anyhow!("Server error: {e}"))?;
  info!("Server shutdown gracefully");
  Ok(())
}
