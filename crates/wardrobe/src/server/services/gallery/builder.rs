use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::artifacts::check_identifier;
use super::Gallery;
use crate::config::BuildPolicy;
use crate::error::{RecommendError, RecommendResult};
use crate::server::services::encoder::{open_image, Embedding, ImageEncoder};

/// File extensions eligible for the gallery, compared case-insensitively
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Encodes a directory of source images into a gallery
pub struct GalleryBuilder<'a> {
  encoder: &'a dyn ImageEncoder,
  policy: BuildPolicy,
}

impl<'a> GalleryBuilder<'a> {
  pub fn new(encoder: &'a dyn ImageEncoder) -> Self {
    Self { encoder, policy: BuildPolicy::Abort }
  }

  pub fn with_policy(mut self, policy: BuildPolicy) -> Self {
    self.policy = policy;
    self
  }

  /// Encode every eligible image in `source_dir`, in file name order
  pub fn build(&self, source_dir: &Path) -> RecommendResult<Gallery> {
    let sources = list_source_images(source_dir)?;
    let total = sources.len();
    info!("Building gallery from {total} images in {}", source_dir.display());

    let mut entries = Vec::with_capacity(total);
    let mut skipped = 0;

    for (index, path) in sources.iter().enumerate() {
      if (index + 1) % 10 == 0 || index + 1 == total {
        info!("Gallery build progress: {}/{total} (skipped: {skipped})", index + 1);
      }

      match self.encode_entry(path) {
        Ok(entry) => entries.push(entry),
        Err(e @ RecommendError::EncoderUnavailable { .. }) => return Err(e),
        Err(e) if self.policy == BuildPolicy::Skip => {
          skipped += 1;
          warn!("Skipping {}: {e}", path.display());
        }
        Err(e) => return Err(e),
      }
    }

    let gallery = Gallery::from_embeddings(entries)?;
    info!("Gallery built: {} entries, {skipped} skipped", gallery.len());
    Ok(gallery)
  }

  fn encode_entry(&self, path: &Path) -> RecommendResult<(String, Embedding)> {
    let identifier = identifier_for(path);
    check_identifier(&identifier)?;
    Ok((identifier, self.encode_file(path)?))
  }

  fn encode_file(&self, path: &Path) -> RecommendResult<Embedding> {
    let image = open_image(path)?;
    let embedding = self.encoder.embed(&image)?;

    if embedding.dimension() != self.encoder.dimension() {
      return Err(RecommendError::DimensionMismatch {
        expected: self.encoder.dimension(),
        actual: embedding.dimension(),
      });
    }
    Ok(embedding)
  }
}

/// Eligible files directly inside `dir`, sorted by file name.
///
/// Sorting fixes the gallery order independently of how the platform lists
/// directory entries.
pub fn list_source_images(dir: &Path) -> RecommendResult<Vec<PathBuf>> {
  let mut paths = Vec::new();

  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    if !entry.file_type()?.is_file() {
      continue;
    }
    let path = entry.path();
    if has_image_extension(&path) {
      paths.push(path);
    }
  }

  paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
  Ok(paths)
}

pub fn has_image_extension(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
    .unwrap_or(false)
}

fn identifier_for(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::server::services::encoder::MockImageEncoder;
  use image::{DynamicImage, Rgb, RgbImage};
  use mockall::mock;
  use tempfile::TempDir;

  mock! {
    Encoder {}
    impl ImageEncoder for Encoder {
      fn embed(&self, image: &DynamicImage) -> RecommendResult<Embedding>;
      fn dimension(&self) -> usize;
      fn model_id(&self) -> String;
    }
  }

  fn write_image(dir: &Path, name: &str, colour: [u8; 3]) {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(colour)))
      .save(dir.join(name))
      .expect("write test image");
  }

  #[test]
  fn test_extension_matching_is_case_insensitive() {
    assert!(has_image_extension(Path::new("a.JPG")));
    assert!(has_image_extension(Path::new("b.Jpeg")));
    assert!(has_image_extension(Path::new("c.png")));
    assert!(!has_image_extension(Path::new("d.gif")));
    assert!(!has_image_extension(Path::new("notes.txt")));
    assert!(!has_image_extension(Path::new("jpg")));
  }

  #[test]
  fn test_listing_is_sorted_flat_and_filtered() -> RecommendResult<()> {
    let dir = TempDir::new()?;
    write_image(dir.path(), "zebra.png", [1, 2, 3]);
    write_image(dir.path(), "apple.jpg", [4, 5, 6]);
    write_image(dir.path(), "mango.PNG", [7, 8, 9]);
    fs::write(dir.path().join("readme.txt"), "not an image")?;
    fs::create_dir(dir.path().join("nested.png"))?;

    let names: Vec<String> = list_source_images(dir.path())?
      .iter()
      .map(|p| p.file_name().unwrap_or_default().to_string_lossy().into_owned())
      .collect();

    assert_eq!(names, vec!["apple.jpg", "mango.PNG", "zebra.png"]);
    Ok(())
  }

  #[test]
  fn test_missing_source_dir_is_io_error() {
    let encoder = MockImageEncoder::new();
    let result = GalleryBuilder::new(&encoder).build(Path::new("/nonexistent/wardrobe/samples"));
    assert!(matches!(result, Err(RecommendError::Io(_))));
  }

  #[test]
  fn test_build_assigns_identifiers_in_order() -> RecommendResult<()> {
    let dir = TempDir::new()?;
    write_image(dir.path(), "b.png", [200, 0, 0]);
    write_image(dir.path(), "a.png", [0, 200, 0]);

    let encoder = MockImageEncoder::new();
    let gallery = GalleryBuilder::new(&encoder).build(dir.path())?;

    assert_eq!(gallery.len(), 2);
    assert_eq!(gallery.dimension(), encoder.dimension());
    assert_eq!(gallery.identifier(0), dir.path().join("a.png").to_string_lossy());
    assert_eq!(gallery.identifier(1), dir.path().join("b.png").to_string_lossy());
    for row in gallery.rows() {
      let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt();
      assert!((norm - 1.0).abs() < 1e-5);
    }
    Ok(())
  }

  #[test]
  fn test_empty_directory_builds_empty_gallery() -> RecommendResult<()> {
    let dir = TempDir::new()?;
    let encoder = MockImageEncoder::new();
    assert!(GalleryBuilder::new(&encoder).build(dir.path())?.is_empty());
    Ok(())
  }

  #[test]
  fn test_abort_policy_fails_whole_build() -> RecommendResult<()> {
    let dir = TempDir::new()?;
    write_image(dir.path(), "good.png", [10, 200, 30]);
    fs::write(dir.path().join("broken.jpg"), b"not really a jpeg")?;

    let encoder = MockImageEncoder::new();
    let result = GalleryBuilder::new(&encoder).build(dir.path());
    assert!(matches!(result, Err(RecommendError::Decode { .. })));
    Ok(())
  }

  #[test]
  fn test_skip_policy_drops_only_broken_files() -> RecommendResult<()> {
    let dir = TempDir::new()?;
    write_image(dir.path(), "good.png", [10, 200, 30]);
    write_image(dir.path(), "black.png", [0, 0, 0]);
    fs::write(dir.path().join("broken.jpg"), b"not really a jpeg")?;

    let encoder = MockImageEncoder::new();
    let gallery = GalleryBuilder::new(&encoder).with_policy(BuildPolicy::Skip).build(dir.path())?;

    assert_eq!(gallery.len(), 1);
    assert!(gallery.identifier(0).ends_with("good.png"));
    Ok(())
  }

  #[test]
  fn test_line_break_in_file_name_follows_policy() -> RecommendResult<()> {
    let dir = TempDir::new()?;
    write_image(dir.path(), "good.png", [10, 200, 30]);
    write_image(dir.path(), "bad\nname.png", [200, 10, 30]);

    let encoder = MockImageEncoder::new();

    let aborted = GalleryBuilder::new(&encoder).build(dir.path());
    assert!(matches!(aborted, Err(RecommendError::InvalidIdentifier { .. })));

    let gallery = GalleryBuilder::new(&encoder).with_policy(BuildPolicy::Skip).build(dir.path())?;
    assert_eq!(gallery.len(), 1);
    assert!(gallery.identifier(0).ends_with("good.png"));
    Ok(())
  }

  #[test]
  fn test_unavailable_encoder_is_fatal_even_when_skipping() -> RecommendResult<()> {
    let dir = TempDir::new()?;
    write_image(dir.path(), "a.png", [10, 20, 30]);
    write_image(dir.path(), "b.png", [40, 50, 60]);

    let mut encoder = MockEncoder::new();
    encoder.expect_dimension().return_const(3usize);
    encoder
      .expect_embed()
      .times(1)
      .returning(|_| Err(RecommendError::encoder_unavailable("device lost")));

    let result = GalleryBuilder::new(&encoder).with_policy(BuildPolicy::Skip).build(dir.path());
    assert!(matches!(result, Err(RecommendError::EncoderUnavailable { .. })));
    Ok(())
  }

  #[test]
  fn test_encoder_returning_wrong_width_is_rejected() -> RecommendResult<()> {
    let dir = TempDir::new()?;
    write_image(dir.path(), "a.png", [10, 20, 30]);

    let mut encoder = MockEncoder::new();
    encoder.expect_dimension().return_const(4usize);
    encoder.expect_embed().returning(|_| Embedding::from_raw(&[1.0, 1.0]));

    let result = GalleryBuilder::new(&encoder).build(dir.path());
    assert!(matches!(result, Err(RecommendError::DimensionMismatch { expected: 4, actual: 2 })));
    Ok(())
  }
}
