// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  output::{
    Render,
    draw::{Draw, FontLoadError},
    record::{Record, RecordFormat},
  },
  select::BestBoxes,
  url_path, url_query,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("{0}")]
  FontError(#[from] FontLoadError),
}

pub enum DrawWrapper {
  Draw(Box<Draw>),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    result: &BestBoxes,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_on_frame(frame, result).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.image.save(path)?;
        record.record(&frame.name, result, path)?;
      }
    };

    Ok(())
  }

  pub fn with(kind: Option<&str>, font: Option<&Path>) -> Result<Self, FontLoadError> {
    let wrapper = match kind {
      Some("json") => DrawWrapper::Record(Record {
        format: RecordFormat::Json,
      }),
      Some("id") => DrawWrapper::Record(Record {
        format: RecordFormat::Text {
          label_with_name: false,
        },
      }),
      Some(_) => DrawWrapper::Record(Record {
        format: RecordFormat::Text {
          label_with_name: true,
        },
      }),
      None => DrawWrapper::Draw(Box::new(Draw::with_optional_font(font)?)),
    };
    Ok(wrapper)
  }
}

/// 按日期分目录保存每一帧的结果
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: AtomicU16,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = url_query(uri, "record");
    let font = url_query(uri, "font").map(PathBuf::from);

    Ok(DirectoryRecordOutput::new(
      url_path(uri),
      DrawWrapper::with(kind.as_deref(), font.as_deref())?,
    ))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, draw: DrawWrapper) -> Self {
    Self {
      directory: directory.into(),
      draw,
      frame_counter: AtomicU16::new(0),
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, frame: &Frame) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}-{}.png",
      now.format("%H-%M-%S"),
      self.frame_id(),
      frame.name
    )))
  }
}

impl Render<Frame, BestBoxes> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &BestBoxes) -> Result<(), Self::Error> {
    let path = self.frame_path(frame)?;
    self.draw.save_result(&path, frame, result)?;
    info!("记录帧 {} 到 {}", frame.name, path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::select::BestBox;
  use image::RgbImage;

  fn result() -> BestBoxes {
    BestBoxes {
      items: vec![BestBox {
        label: 0,
        query: "cat".to_string(),
        score: 0.5,
        bbox: [1, 1, 5, 5],
      }]
      .into_boxed_slice(),
    }
  }

  fn files_with_extension(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == extension) {
          found.push(path);
        }
      }
    }
    found
  }

  #[test]
  fn json_record_writes_image_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let url = url::Url::parse(&format!("folder://{}?record=json", dir.path().display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();

    let frame = Frame::new("kitchen", RgbImage::new(8, 8));
    output.render_result(&frame, &result()).unwrap();
    output.render_result(&frame, &result()).unwrap();

    assert_eq!(files_with_extension(dir.path(), "png").len(), 2);
    let records = files_with_extension(dir.path(), "json");
    assert_eq!(records.len(), 2);
    let content = std::fs::read_to_string(&records[0]).unwrap();
    assert!(content.contains("\"kitchen\""));
  }

  #[test]
  fn frame_ids_increase() {
    let output = DirectoryRecordOutput::new("/tmp", DrawWrapper::Draw(Box::default()));
    assert_eq!(output.frame_id(), 1);
    assert_eq!(output.frame_id(), 2);
  }
}
