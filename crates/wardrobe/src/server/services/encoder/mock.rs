use image::{imageops::FilterType, DynamicImage};

use super::{to_rgb, Embedding, ImageEncoder};
use crate::error::{RecommendError, RecommendResult};

/// Deterministic stand-in for the neural encoder.
///
/// Downsamples the image to a `grid x grid` RGB thumbnail and uses the
/// scaled pixel values as the raw vector. Similar colour layouts land close
/// together, which is enough to exercise gallery and ranking code without a
/// model. A fully black image has a zero raw vector.
pub struct MockImageEncoder {
  pub grid: u32,
  pub unavailable: bool,
}

impl MockImageEncoder {
  pub fn new() -> Self {
    Self { grid: 4, unavailable: false }
  }

  pub fn with_grid(mut self, grid: u32) -> Self {
    self.grid = grid.max(1);
    self
  }

  /// Fail every call as if the model could not be reached
  pub fn with_unavailable(mut self) -> Self {
    self.unavailable = true;
    self
  }
}

impl Default for MockImageEncoder {
  fn default() -> Self {
    Self::new()
  }
}

impl ImageEncoder for MockImageEncoder {
  fn embed(&self, image: &DynamicImage) -> RecommendResult<Embedding> {
    if self.unavailable {
      return Err(RecommendError::encoder_unavailable("mock encoder configured as unavailable"));
    }

    let thumbnail = to_rgb(image).resize_exact(self.grid, self.grid, FilterType::Triangle).to_rgb8();
    let raw: Vec<f32> = thumbnail.pixels().flat_map(|p| p.0).map(|c| f32::from(c) / 255.0).collect();

    Embedding::from_raw(&raw)
  }

  fn dimension(&self) -> usize {
    (self.grid * self.grid * 3) as usize
  }

  fn model_id(&self) -> String {
    format!("mock-grid-{}", self.grid)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([r, g, b])))
  }

  #[test]
  fn test_embedding_has_declared_dimension_and_unit_norm() -> RecommendResult<()> {
    let encoder = MockImageEncoder::new().with_grid(3);
    let embedding = encoder.embed(&solid(200, 10, 40))?;
    assert_eq!(embedding.dimension(), encoder.dimension());
    assert_eq!(encoder.dimension(), 27);
    assert!((embedding.norm() - 1.0).abs() < 1e-5);
    Ok(())
  }

  #[test]
  fn test_embedding_is_deterministic() -> RecommendResult<()> {
    let encoder = MockImageEncoder::new();
    let image = solid(12, 99, 250);
    assert_eq!(encoder.embed(&image)?, encoder.embed(&image)?);
    Ok(())
  }

  #[test]
  fn test_similar_colours_score_higher() -> RecommendResult<()> {
    let encoder = MockImageEncoder::new();
    let red = encoder.embed(&solid(250, 5, 5))?;
    let dark_red = encoder.embed(&solid(180, 10, 10))?;
    let blue = encoder.embed(&solid(5, 5, 250))?;

    let dot = |a: &Embedding, b: &Embedding| -> f32 {
      a.as_slice().iter().zip(b.as_slice()).map(|(x, y)| x * y).sum()
    };
    assert!(dot(&red, &dark_red) > dot(&red, &blue));
    Ok(())
  }

  #[test]
  fn test_black_image_is_degenerate() {
    let result = MockImageEncoder::new().embed(&solid(0, 0, 0));
    assert!(matches!(result, Err(RecommendError::DegenerateEmbedding { .. })));
  }

  #[test]
  fn test_unavailable_encoder_fails() {
    let result = MockImageEncoder::new().with_unavailable().embed(&solid(1, 2, 3));
    assert!(matches!(result, Err(RecommendError::EncoderUnavailable { .. })));
  }
}
