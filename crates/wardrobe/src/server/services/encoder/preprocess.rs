use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

use super::to_rgb;

/// Input resolution of the CLIP ViT-B/32 image tower
pub const INPUT_SIZE: u32 = 224;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Build the `[1, 3, size, size]` pixel tensor CLIP expects.
///
/// Shortest side is resized to `size` with bicubic filtering and the centre
/// square is kept, then each channel is standardised with CLIP's statistics.
pub fn preprocess(image: &DynamicImage, size: u32) -> Array4<f32> {
  let square = to_rgb(image).resize_to_fill(size, size, FilterType::CatmullRom).to_rgb8();
  let side = size as usize;

  let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
  for (x, y, pixel) in square.enumerate_pixels() {
    for channel in 0..3 {
      let value = f32::from(pixel[channel]) / 255.0;
      tensor[[0, channel, y as usize, x as usize]] = (value - CLIP_MEAN[channel]) / CLIP_STD[channel];
    }
  }

  tensor
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{GrayImage, Luma, Rgb, RgbImage};

  #[test]
  fn test_tensor_shape_is_nchw() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
    let tensor = preprocess(&image, INPUT_SIZE);
    assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
  }

  #[test]
  fn test_channels_are_standardised() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 80, Rgb([255, 0, 128])));
    let tensor = preprocess(&image, 8);

    let expected_r = (1.0 - CLIP_MEAN[0]) / CLIP_STD[0];
    let expected_g = (0.0 - CLIP_MEAN[1]) / CLIP_STD[1];
    let expected_b = (128.0 / 255.0 - CLIP_MEAN[2]) / CLIP_STD[2];

    assert!((tensor[[0, 0, 3, 3]] - expected_r).abs() < 1e-4);
    assert!((tensor[[0, 1, 3, 3]] - expected_g).abs() < 1e-4);
    assert!((tensor[[0, 2, 3, 3]] - expected_b).abs() < 1e-4);
  }

  #[test]
  fn test_grayscale_fills_all_channels() {
    let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([255])));
    let tensor = preprocess(&image, 4);

    for channel in 0..3 {
      let expected = (1.0 - CLIP_MEAN[channel]) / CLIP_STD[channel];
      assert!((tensor[[0, channel, 0, 0]] - expected).abs() < 1e-4);
    }
  }

  #[test]
  fn test_preprocess_is_deterministic() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(33, 21, |x, y| {
      Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8])
    }));
    assert_eq!(preprocess(&image, 16), preprocess(&image, 16));
  }
}
