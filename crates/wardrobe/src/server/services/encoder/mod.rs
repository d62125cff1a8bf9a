//! Image encoder abstraction
//!
//! Every embedding that enters the gallery or a query goes through
//! [`Embedding::from_raw`], so the unit-norm invariant holds regardless of
//! which [`ImageEncoder`] produced the raw vector.

#[cfg(feature = "ml-features")]
pub mod clip;
pub mod mock;
#[cfg(feature = "ml-features")]
pub mod preprocess;

use image::DynamicImage;
use std::path::Path;

use crate::error::{RecommendError, RecommendResult};

pub use mock::MockImageEncoder;

/// Raw vectors with a smaller norm than this are rejected instead of scaled
const MIN_NORM: f64 = 1e-12;

/// Unit-length image embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
  /// Normalize a raw encoder output to unit length.
  ///
  /// The norm and the division are carried out in `f64`; values are only
  /// narrowed to `f32` once scaled.
  pub fn from_raw(raw: &[f32]) -> RecommendResult<Self> {
    let norm = raw.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();

    if !norm.is_finite() || norm < MIN_NORM {
      return Err(RecommendError::DegenerateEmbedding { norm });
    }

    Ok(Self(raw.iter().map(|&x| (f64::from(x) / norm) as f32).collect()))
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.0
  }

  pub fn dimension(&self) -> usize {
    self.0.len()
  }

  #[cfg(test)]
  pub(crate) fn norm(&self) -> f32 {
    self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.0
  }
}

/// Converts decoded images into embeddings.
///
/// Implementations must be deterministic and free of shared mutable state
/// visible to callers; the same image always yields the same embedding.
pub trait ImageEncoder: Send + Sync {
  /// Embed an image of any channel layout
  fn embed(&self, image: &DynamicImage) -> RecommendResult<Embedding>;

  /// Length of every embedding this encoder produces
  fn dimension(&self) -> usize;

  /// Human readable model identifier
  fn model_id(&self) -> String;
}

/// Decode uploaded bytes, sniffing the format from the content
pub fn decode_image(bytes: &[u8]) -> RecommendResult<DynamicImage> {
  if bytes.is_empty() {
    return Err(RecommendError::decode("empty upload"));
  }
  image::load_from_memory(bytes).map_err(|e| RecommendError::decode(e.to_string()))
}

/// Decode an image file from disk
pub fn open_image(path: &Path) -> RecommendResult<DynamicImage> {
  image::ImageReader::open(path)
    .map_err(|e| RecommendError::decode(format!("{}: {e}", path.display())))?
    .with_guessed_format()
    .map_err(|e| RecommendError::decode(format!("{}: {e}", path.display())))?
    .decode()
    .map_err(|e| RecommendError::decode(format!("{}: {e}", path.display())))
}

/// Force an image into 8-bit RGB, the layout every encoder consumes
pub fn to_rgb(image: &DynamicImage) -> DynamicImage {
  match image {
    DynamicImage::ImageRgb8(_) => image.clone(),
    other => DynamicImage::ImageRgb8(other.to_rgb8()),
  }
}
