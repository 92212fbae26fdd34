// 该文件是 Kanjian （看见） 项目的一部分。
// src/input.rs - 图像输入
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

use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, open_image};

mod directory_input;
pub use self::directory_input::{DirectoryInput, DirectoryInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Directory input error: {0}")]
  DirectoryInputError(#[from] DirectoryInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  Directory(DirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      DirectoryInput::SCHEME => Ok(InputWrapper::Directory(DirectoryInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::Directory(input) => input.next(),
    }
  }
}
