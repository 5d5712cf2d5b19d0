// 该文件是 Cheshang （车伤） 项目的一部分。
// src/input.rs - 图像输入与预处理
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::{ImageFormat, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

/// 预处理后图像长边的像素数
pub const PREPARED_IMAGE_SIZE: u32 = 640;

/// 允许上传的图像格式
pub const SUPPORTED_FORMATS: [ImageFormat; 2] = [ImageFormat::Png, ImageFormat::Jpeg];

#[derive(Error, Debug)]
pub enum ImagePrepError {
  #[error("the uploaded data is not a recognised image")]
  Unrecognized,
  #[error("unsupported image format {0:?}, only PNG and JPEG are accepted")]
  UnsupportedFormat(ImageFormat),
  #[error("failed to decode image: {0}")]
  Decode(#[from] image::ImageError),
}

/// 解码上传的字节流，转换为 RGB，并把长边缩放到 [`PREPARED_IMAGE_SIZE`]。
pub fn prepare_image(bytes: &[u8]) -> Result<RgbImage, ImagePrepError> {
  let format = image::guess_format(bytes).map_err(|_| ImagePrepError::Unrecognized)?;
  if !SUPPORTED_FORMATS.contains(&format) {
    return Err(ImagePrepError::UnsupportedFormat(format));
  }

  let image = image::load_from_memory_with_format(bytes, format)?;
  debug!(
    "解码图像: {:?} {}x{} {:?}",
    format,
    image.width(),
    image.height(),
    image.color()
  );

  // 丢弃 alpha 通道，灰度图扩展为三通道
  Ok(resize_to_bound(image.into_rgb8(), PREPARED_IMAGE_SIZE))
}

/// 计算长边等于 `bound` 时的目标尺寸，短边按宽高比截断取整。
pub fn bounded_dimensions(width: u32, height: u32, bound: u32) -> (u32, u32) {
  let aspect_ratio = width as f64 / height as f64;
  let (new_width, new_height) = if aspect_ratio > 1.0 {
    (bound, (bound as f64 / aspect_ratio) as u32)
  } else {
    ((bound as f64 * aspect_ratio) as u32, bound)
  };

  // 极端宽高比下短边可能截断为 0
  (new_width.max(1), new_height.max(1))
}

pub fn resize_to_bound(image: RgbImage, bound: u32) -> RgbImage {
  let (width, height) = bounded_dimensions(image.width(), image.height(), bound);
  if (width, height) == image.dimensions() {
    return image;
  }
  debug!(
    "缩放图像: {}x{} -> {}x{}",
    image.width(),
    image.height(),
    width,
    height
  );
  image::imageops::resize(&image, width, height, FilterType::CatmullRom)
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(test)]
mod tests {
  use super::*;
  use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
  use std::io::Cursor;

  fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
  }

  #[test]
  fn landscape_keeps_aspect_ratio() {
    assert_eq!(bounded_dimensions(1000, 500, 640), (640, 320));
  }

  #[test]
  fn portrait_keeps_aspect_ratio() {
    assert_eq!(bounded_dimensions(500, 1000, 640), (320, 640));
  }

  #[test]
  fn square_becomes_exact_bound() {
    assert_eq!(bounded_dimensions(1234, 1234, 640), (640, 640));
    assert_eq!(bounded_dimensions(32, 32, 640), (640, 640));
  }

  #[test]
  fn short_side_is_truncated() {
    // 640 / (1000 / 333) = 213.12
    assert_eq!(bounded_dimensions(1000, 333, 640), (640, 213));
  }

  #[test]
  fn extreme_ratio_never_yields_zero() {
    assert_eq!(bounded_dimensions(5000, 1, 640), (640, 1));
  }

  #[test]
  fn prepares_png_upload() {
    let image = RgbImage::from_pixel(1000, 500, Rgb([10, 20, 30]));
    let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Png);

    let prepared = prepare_image(&bytes).unwrap();
    assert_eq!(prepared.dimensions(), (640, 320));
    assert_eq!(prepared.get_pixel(100, 100), &Rgb([10, 20, 30]));
  }

  #[test]
  fn prepares_jpeg_upload() {
    let image = RgbImage::from_pixel(300, 600, Rgb([200, 200, 200]));
    let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg);

    let prepared = prepare_image(&bytes).unwrap();
    assert_eq!(prepared.dimensions(), (320, 640));
  }

  #[test]
  fn alpha_channel_is_dropped() {
    let image = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 128]));
    let bytes = encode(DynamicImage::ImageRgba8(image), ImageFormat::Png);

    let prepared = prepare_image(&bytes).unwrap();
    assert_eq!(prepared.dimensions(), (640, 640));
    assert_eq!(prepared.get_pixel(320, 320), &Rgb([255, 0, 0]));
  }

  #[test]
  fn rejects_other_formats() {
    let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";
    assert!(matches!(
      prepare_image(gif),
      Err(ImagePrepError::UnsupportedFormat(ImageFormat::Gif))
    ));
  }

  #[test]
  fn rejects_garbage() {
    assert!(matches!(
      prepare_image(b"definitely not an image"),
      Err(ImagePrepError::Unrecognized)
    ));
  }

  #[test]
  fn rejects_truncated_png() {
    let image = RgbImage::from_pixel(16, 16, Rgb([1, 2, 3]));
    let bytes = encode(DynamicImage::ImageRgb8(image), ImageFormat::Png);

    assert!(matches!(
      prepare_image(&bytes[..24]),
      Err(ImagePrepError::Decode(_))
    ));
  }
}
