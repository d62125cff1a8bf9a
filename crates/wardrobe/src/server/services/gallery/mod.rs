//! The reference collection of precomputed image embeddings
//!
//! A [`Gallery`] keeps identifiers and a row-major embedding matrix side by
//! side. Both are fixed at construction; rebuilding produces a new value that
//! is published through [`SharedGallery`].

pub mod artifacts;
pub mod builder;
pub mod store;

use std::sync::Arc;
use tokio::sync::RwLock;

use super::encoder::Embedding;
use crate::error::{RecommendError, RecommendResult};

pub use builder::GalleryBuilder;
pub use store::GalleryStore;

#[derive(Debug, Clone, PartialEq)]
pub struct Gallery {
  identifiers: Vec<String>,
  matrix: Vec<f32>,
  dimension: usize,
}

impl Gallery {
  /// Assemble a gallery, refusing matrices that do not line up with the identifiers
  pub fn new(identifiers: Vec<String>, matrix: Vec<f32>, dimension: usize) -> RecommendResult<Self> {
    if identifiers.is_empty() && matrix.is_empty() {
      return Ok(Self { identifiers, matrix, dimension });
    }
    if dimension == 0 {
      return Err(RecommendError::gallery_inconsistent("non-empty gallery with zero dimension"));
    }
    if matrix.len() % dimension != 0 {
      return Err(RecommendError::gallery_inconsistent(format!(
        "matrix of {} values is not a whole number of {dimension}-wide rows",
        matrix.len()
      )));
    }

    let rows = matrix.len() / dimension;
    if rows != identifiers.len() {
      return Err(RecommendError::gallery_inconsistent(format!(
        "{rows} embedding rows but {} identifiers",
        identifiers.len()
      )));
    }

    Ok(Self { identifiers, matrix, dimension })
  }

  /// Assemble a gallery from whole embeddings
  pub fn from_embeddings(entries: Vec<(String, Embedding)>) -> RecommendResult<Self> {
    let dimension = entries.first().map(|(_, e)| e.dimension()).unwrap_or(0);
    let mut identifiers = Vec::with_capacity(entries.len());
    let mut matrix = Vec::with_capacity(entries.len() * dimension);

    for (identifier, embedding) in entries {
      if embedding.dimension() != dimension {
        return Err(RecommendError::DimensionMismatch {
          expected: dimension,
          actual: embedding.dimension(),
        });
      }
      identifiers.push(identifier);
      matrix.extend(embedding.into_vec());
    }

    Self::new(identifiers, matrix, dimension)
  }

  pub fn empty() -> Self {
    Self { identifiers: Vec::new(), matrix: Vec::new(), dimension: 0 }
  }

  pub fn len(&self) -> usize {
    self.identifiers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.identifiers.is_empty()
  }

  pub fn dimension(&self) -> usize {
    self.dimension
  }

  pub fn identifiers(&self) -> &[String] {
    &self.identifiers
  }

  /// Flat row-major embedding storage
  pub fn matrix(&self) -> &[f32] {
    &self.matrix
  }

  /// Panics if `index` is out of range
  pub fn identifier(&self, index: usize) -> &str {
    &self.identifiers[index]
  }

  pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
    // chunks_exact panics on a zero chunk size; an empty gallery has no rows anyway
    self.matrix.chunks_exact(self.dimension.max(1))
  }
}

/// Read-mostly handle to the gallery currently being served.
///
/// Readers take an `Arc` snapshot and never hold the lock while ranking; a
/// rebuilt gallery replaces the old one in a single write.
#[derive(Debug)]
pub struct SharedGallery {
  current: RwLock<Arc<Gallery>>,
}

impl SharedGallery {
  pub fn new(gallery: Gallery) -> Self {
    Self { current: RwLock::new(Arc::new(gallery)) }
  }

  pub async fn snapshot(&self) -> Arc<Gallery> {
    self.current.read().await.clone()
  }

  /// Swap in a fully built gallery, returning the one it replaced
  pub async fn publish(&self, gallery: Gallery) -> Arc<Gallery> {
    let mut current = self.current.write().await;
    std::mem::replace(&mut *current, Arc::new(gallery))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_new_accepts_aligned_data() -> RecommendResult<()> {
    let gallery = Gallery::new(ids(&["a", "b"]), vec![1.0, 0.0, 0.0, 1.0], 2)?;
    assert_eq!(gallery.len(), 2);
    assert_eq!(gallery.dimension(), 2);
    assert_eq!(gallery.rows().collect::<Vec<_>>(), vec![&[1.0, 0.0][..], &[0.0, 1.0][..]]);
    Ok(())
  }

  #[test]
  fn test_new_rejects_row_count_mismatch() {
    let result = Gallery::new(ids(&["a", "b", "c"]), vec![1.0, 0.0, 0.0, 1.0], 2);
    assert!(matches!(result, Err(RecommendError::GalleryInconsistent { .. })));
  }

  #[test]
  fn test_new_rejects_ragged_matrix() {
    let result = Gallery::new(ids(&["a"]), vec![1.0, 0.0, 0.5], 2);
    assert!(matches!(result, Err(RecommendError::GalleryInconsistent { .. })));
  }

  #[test]
  fn test_new_rejects_zero_dimension_with_rows() {
    let result = Gallery::new(ids(&["a"]), vec![], 0);
    assert!(matches!(result, Err(RecommendError::GalleryInconsistent { .. })));
  }

  #[test]
  fn test_from_embeddings_rejects_mixed_dimensions() -> RecommendResult<()> {
    let entries = vec![
      ("a".to_string(), Embedding::from_raw(&[1.0, 0.0])?),
      ("b".to_string(), Embedding::from_raw(&[1.0, 0.0, 0.0])?),
    ];
    assert!(matches!(
      Gallery::from_embeddings(entries),
      Err(RecommendError::DimensionMismatch { expected: 2, actual: 3 })
    ));
    Ok(())
  }

  #[test]
  fn test_rows_stay_index_aligned() -> RecommendResult<()> {
    let entries = vec![
      ("first".to_string(), Embedding::from_raw(&[2.0, 0.0])?),
      ("second".to_string(), Embedding::from_raw(&[0.0, 3.0])?),
    ];
    let gallery = Gallery::from_embeddings(entries)?;

    let rows: Vec<(&String, &[f32])> = gallery.identifiers().iter().zip(gallery.rows()).collect();
    assert_eq!(rows[0], (&"first".to_string(), &[1.0, 0.0][..]));
    assert_eq!(rows[1], (&"second".to_string(), &[0.0, 1.0][..]));
    assert_eq!(gallery.identifier(1), "second");
    Ok(())
  }

  #[test]
  fn test_empty_gallery_has_no_rows() {
    let gallery = Gallery::empty();
    assert!(gallery.is_empty());
    assert_eq!(gallery.rows().count(), 0);
  }

  #[tokio::test]
  async fn test_publish_swaps_whole_gallery() -> RecommendResult<()> {
    let shared = SharedGallery::new(Gallery::empty());
    let before = shared.snapshot().await;

    let replacement = Gallery::new(ids(&["x"]), vec![1.0], 1)?;
    let previous = shared.publish(replacement).await;

    assert!(previous.is_empty());
    assert!(before.is_empty(), "existing snapshots are unaffected by a publish");
    assert_eq!(shared.snapshot().await.identifiers(), &["x".to_string()]);
    Ok(())
  }
}
