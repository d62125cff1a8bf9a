//! Exact top-k ranking of a gallery against a query embedding

use serde::{Deserialize, Serialize};

use super::encoder::Embedding;
use super::gallery::Gallery;
use crate::error::{RecommendError, RecommendResult};

/// One ranked gallery item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
  pub score: f32,
  pub image_path: String,
}

/// Dot product of two equally long vectors
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
  a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Score every gallery row against the query.
///
/// Both sides are unit length, so the dot product is their cosine similarity.
pub fn scores(query: &Embedding, gallery: &Gallery) -> RecommendResult<Vec<f32>> {
  if gallery.is_empty() {
    return Ok(Vec::new());
  }
  if query.dimension() != gallery.dimension() {
    return Err(RecommendError::DimensionMismatch {
      expected: gallery.dimension(),
      actual: query.dimension(),
    });
  }

  // Adding 0.0 folds -0.0 into 0.0 so total_cmp treats the two as a tie
  Ok(gallery.rows().map(|row| dot(query.as_slice(), row) + 0.0).collect())
}

/// Return the `k` best matches, highest score first.
///
/// Entries with equal scores keep their gallery order. `k` larger than the
/// gallery returns every entry.
pub fn top_k(query: &Embedding, gallery: &Gallery, k: usize) -> RecommendResult<Vec<Match>> {
  let scores = scores(query, gallery)?;
  if k == 0 {
    return Ok(Vec::new());
  }

  let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
  // sort_by is stable, which is what keeps ties in gallery order
  ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
  ranked.truncate(k);

  Ok(
    ranked
      .into_iter()
      .map(|(index, score)| Match { score, image_path: gallery.identifier(index).to_string() })
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Unit vector in 2-D whose dot product with [1, 0] is `score`
  fn with_score(score: f32) -> Vec<f32> {
    vec![score, (1.0 - score * score).sqrt()]
  }

  fn gallery(rows: &[(&str, Vec<f32>)]) -> Gallery {
    let ids = rows.iter().map(|(id, _)| id.to_string()).collect();
    let dim = rows.first().map(|(_, v)| v.len()).unwrap_or(0);
    let matrix = rows.iter().flat_map(|(_, v)| v.clone()).collect();
    Gallery::new(ids, matrix, dim).expect("valid gallery")
  }

  fn query() -> Embedding {
    Embedding::from_raw(&[1.0, 0.0]).expect("unit query")
  }

  #[test]
  fn test_top_two_of_three() -> RecommendResult<()> {
    let gallery = gallery(&[
      ("e1", with_score(0.9)),
      ("e2", with_score(0.95)),
      ("e3", with_score(0.1)),
    ]);

    let result = top_k(&query(), &gallery, 2)?;

    assert_eq!(result.len(), 2);
    assert_eq!(result[0].image_path, "e2");
    assert!((result[0].score - 0.95).abs() < 1e-6);
    assert_eq!(result[1].image_path, "e1");
    assert!((result[1].score - 0.9).abs() < 1e-6);
    Ok(())
  }

  #[test]
  fn test_ties_keep_gallery_order() -> RecommendResult<()> {
    let gallery = gallery(&[
      ("entry0", with_score(0.5)),
      ("entry1", with_score(0.5)),
      ("lower", with_score(0.2)),
    ]);

    for _ in 0..5 {
      let result = top_k(&query(), &gallery, 3)?;
      let ids: Vec<&str> = result.iter().map(|m| m.image_path.as_str()).collect();
      assert_eq!(ids, vec!["entry0", "entry1", "lower"]);
    }
    Ok(())
  }

  #[test]
  fn test_signed_zero_scores_tie_in_gallery_order() -> RecommendResult<()> {
    let gallery = gallery(&[("entry0", vec![-0.0, -1.0]), ("entry1", vec![0.0, 1.0])]);

    let scores = scores(&query(), &gallery)?;
    assert!(scores.iter().all(|s| s.to_bits() == 0.0f32.to_bits()));

    let result = top_k(&query(), &gallery, 2)?;
    let ids: Vec<&str> = result.iter().map(|m| m.image_path.as_str()).collect();
    assert_eq!(ids, vec!["entry0", "entry1"]);
    Ok(())
  }

  #[test]
  fn test_zero_k_is_empty() -> RecommendResult<()> {
    let gallery = gallery(&[("a", with_score(0.3))]);
    assert!(top_k(&query(), &gallery, 0)?.is_empty());
    Ok(())
  }

  #[test]
  fn test_k_beyond_gallery_returns_everything_sorted() -> RecommendResult<()> {
    let gallery = gallery(&[
      ("a", with_score(0.1)),
      ("b", with_score(0.7)),
      ("c", with_score(-0.4)),
    ]);

    let all = top_k(&query(), &gallery, 3)?;
    assert_eq!(top_k(&query(), &gallery, 50)?, all);
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(all[2].image_path, "c");
    Ok(())
  }

  #[test]
  fn test_empty_gallery_is_not_an_error() -> RecommendResult<()> {
    let empty = Gallery::empty();
    assert!(top_k(&query(), &empty, 3)?.is_empty());
    assert!(scores(&query(), &empty)?.is_empty());
    Ok(())
  }

  #[test]
  fn test_dimension_mismatch_is_reported() {
    let gallery = gallery(&[("a", vec![0.0, 0.0, 1.0])]);
    let result = top_k(&query(), &gallery, 1);
    assert!(matches!(
      result,
      Err(RecommendError::DimensionMismatch { expected: 3, actual: 2 })
    ));
  }

  #[test]
  fn test_scores_cover_every_row_in_order() -> RecommendResult<()> {
    let gallery = gallery(&[("a", with_score(0.25)), ("b", with_score(0.75))]);
    let scores = scores(&query(), &gallery)?;
    assert_eq!(scores.len(), 2);
    assert!((scores[0] - 0.25).abs() < 1e-6);
    assert!((scores[1] - 0.75).abs() < 1e-6);
    Ok(())
  }

  #[test]
  fn test_exactly_k_results_non_increasing() -> RecommendResult<()> {
    let rows: Vec<(String, Vec<f32>)> = (0..20)
      .map(|i| (format!("item{i}"), with_score(((i * 37) % 19) as f32 / 19.0)))
      .collect();
    let refs: Vec<(&str, Vec<f32>)> = rows.iter().map(|(id, v)| (id.as_str(), v.clone())).collect();
    let gallery = gallery(&refs);

    for k in 1..=20 {
      let result = top_k(&query(), &gallery, k)?;
      assert_eq!(result.len(), k);
      assert!(result.windows(2).all(|w| w[0].score >= w[1].score));
    }
    Ok(())
  }
}
