//! Shared application state handed to every handler

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tracing::info;

use crate::config::Settings;
use crate::error::{RecommendError, RecommendResult};
use crate::server::services::encoder::{decode_image, Embedding, ImageEncoder};
use crate::server::services::gallery::{Gallery, GalleryStore, SharedGallery};

#[derive(Clone)]
pub struct AppState {
  pub settings: Arc<Settings>,
  pub encoder: Arc<dyn ImageEncoder>,
  pub gallery: Arc<SharedGallery>,
  pub store: Arc<GalleryStore>,
  pub started_at: DateTime<Utc>,
  encode_permits: Arc<Semaphore>,
  rebuild_lock: Arc<Mutex<()>>,
}

/// Held for the duration of a gallery rebuild
pub struct RebuildGuard(OwnedMutexGuard<()>);

impl AppState {
  pub fn new(settings: Settings, encoder: Arc<dyn ImageEncoder>, gallery: Gallery) -> Self {
    let store = GalleryStore::new(&settings.source_dir, settings.cache_paths()).with_policy(settings.build_policy);
    let encode_permits = Arc::new(Semaphore::new(settings.encoder_workers.max(1)));

    Self {
      settings: Arc::new(settings),
      encoder,
      gallery: Arc::new(SharedGallery::new(gallery)),
      store: Arc::new(store),
      started_at: Utc::now(),
      encode_permits,
      rebuild_lock: Arc::new(Mutex::new(())),
    }
  }

  /// Decode and embed an uploaded image on the blocking pool.
  ///
  /// At most `encoder_workers` uploads are processed at once; the rest wait
  /// for a permit. When `encode_timeout_secs` is set, a request that has not
  /// produced an embedding in time fails with [`RecommendError::Timeout`].
  pub async fn embed_upload(&self, bytes: Bytes) -> RecommendResult<Embedding> {
    let encoder = Arc::clone(&self.encoder);
    let task = async move {
      let permit = Arc::clone(&self.encode_permits)
        .acquire_owned()
        .await
        .map_err(|_| RecommendError::encoder_unavailable("encoder pool is shut down"))?;

      tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let image = decode_image(&bytes)?;
        encoder.embed(&image)
      })
      .await
      .map_err(|e| RecommendError::encoder_unavailable(format!("encoder task failed: {e}")))?
    };

    match self.settings.encode_timeout_secs {
      Some(seconds) => tokio::time::timeout(Duration::from_secs(seconds), task)
        .await
        .map_err(|_| RecommendError::Timeout { seconds })?,
      None => task.await,
    }
  }

  /// Claim the rebuild slot, or `None` if a rebuild is already running
  pub fn try_begin_rebuild(&self) -> Option<RebuildGuard> {
    Arc::clone(&self.rebuild_lock).try_lock_owned().ok().map(RebuildGuard)
  }

  /// Rebuild from the source directory, persist, and publish the result.
  ///
  /// Requests already ranking keep their snapshot of the previous gallery.
  pub async fn rebuild_gallery(&self, _guard: RebuildGuard) -> RecommendResult<Arc<Gallery>> {
    let encoder = Arc::clone(&self.encoder);
    let store = Arc::clone(&self.store);

    let gallery = tokio::task::spawn_blocking(move || store.rebuild(encoder.as_ref()))
      .await
      .map_err(|e| RecommendError::encoder_unavailable(format!("rebuild task failed: {e}")))??;

    self.gallery.publish(gallery).await;
    let current = self.gallery.snapshot().await;
    info!("Published rebuilt gallery with {} entries", current.len());
    Ok(current)
  }
}
