// 该文件是 Kanjian （看见） 项目的一部分。
// src/frame.rs - 输入帧定义
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

use image::RgbImage;

/// 一帧解码后的图像，保持原始尺寸
#[derive(Debug, Clone)]
pub struct Frame {
  /// 帧名称（来源文件的文件名主干）
  pub name: String,
  pub image: RgbImage,
}

impl Frame {
  pub fn new(name: impl Into<String>, image: RgbImage) -> Self {
    Self {
      name: name.into(),
      image,
    }
  }

  pub fn from_path(path: &Path, image: RgbImage) -> Self {
    let name = path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "frame".to_string());
    Self::new(name, image)
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

impl AsRef<RgbImage> for Frame {
  fn as_ref(&self) -> &RgbImage {
    &self.image
  }
}
