// 该文件是 Kanjian （看见） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, url_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 读取图像文件并转为 RGB，保持原始尺寸
pub fn open_image(path: &Path) -> Result<RgbImage, ImageFileInputError> {
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
  debug!(
    "读取图像 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(image.into_rgb8())
}

pub struct ImageFileInput {
  frame: Option<Frame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Self::open(&url_path(url))
  }
}

impl ImageFileInput {
  pub fn open(path: &Path) -> Result<Self, ImageFileInputError> {
    let image = open_image(path)?;
    Ok(ImageFileInput {
      frame: Some(Frame::from_path(path, image)),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yields_one_frame_named_after_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("toaster.png");
    RgbImage::from_pixel(8, 6, image::Rgb([10, 20, 30]))
      .save(&path)
      .unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&url.as_str().replacen("file:", "image:", 1)).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();

    let frame = input.next().unwrap();
    assert_eq!(frame.name, "toaster");
    assert_eq!((frame.width(), frame.height()), (8, 6));
    assert!(input.next().is_none());
  }

  #[test]
  fn missing_file_is_io_error() {
    let err = ImageFileInput::open(Path::new("/nonexistent/kanjian.png")).err().unwrap();
    assert!(matches!(err, ImageFileInputError::IoError(_)));
  }
}
