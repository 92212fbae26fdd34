// 该文件是 Kanjian （看见） 项目的一部分。
// src/input/directory_input.rs - 目录批量图像输入
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, input::open_image, url_path};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐个读取目录中的图像
pub struct DirectoryInput {
  files: std::vec::IntoIter<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemaMismatch);
    }
    Self::open(&url_path(url))
  }
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
      .unwrap_or(false)
}

impl DirectoryInput {
  pub fn open(directory: &Path) -> Result<Self, DirectoryInputError> {
    let mut files = std::fs::read_dir(directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| is_image_file(path))
      .collect::<Vec<_>>();
    files.sort();

    info!("目录 {} 中共有 {} 个图像文件", directory.display(), files.len());
    Ok(DirectoryInput {
      files: files.into_iter(),
    })
  }
}

impl Iterator for DirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match open_image(&path) {
        Ok(image) => return Some(Frame::from_path(&path, image)),
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  #[test]
  fn yields_images_sorted_and_skips_others() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.png", "a.png"] {
      RgbImage::new(2, 2).save(dir.path().join(name)).unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();
    std::fs::write(dir.path().join("broken.png"), "not a png").unwrap();

    let names: Vec<_> = DirectoryInput::open(dir.path())
      .unwrap()
      .map(|f| f.name)
      .collect();
    assert_eq!(names, vec!["a", "b"]);
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("image:///tmp").unwrap();
    assert!(matches!(
      DirectoryInput::from_url(&url),
      Err(DirectoryInputError::SchemaMismatch)
    ));
  }
}
