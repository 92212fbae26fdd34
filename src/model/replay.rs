// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/replay.rs - 回放外部模型的检测结果
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{Detection, DetectionSet, Detector},
  query::Queries,
  url_path, url_query,
};

/// 预训练模型后处理输出的文件格式（COCO 风格）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayFile {
  pub boxes: Vec<[f32; 4]>,
  pub scores: Vec<f32>,
  pub labels: Vec<usize>,
  /// 产生该结果时使用的查询列表
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub queries: Option<Vec<String>>,
}

impl ReplayFile {
  pub fn into_detections(self) -> Result<DetectionSet, ReplayDetectorError> {
    if self.boxes.len() != self.scores.len() || self.boxes.len() != self.labels.len() {
      return Err(ReplayDetectorError::LengthMismatch {
        boxes: self.boxes.len(),
        scores: self.scores.len(),
        labels: self.labels.len(),
      });
    }

    Ok(
      self
        .boxes
        .into_iter()
        .zip(self.scores)
        .zip(self.labels)
        .map(|((bbox, score), label)| Detection { label, score, bbox })
        .collect(),
    )
  }
}

impl From<&DetectionSet> for ReplayFile {
  fn from(set: &DetectionSet) -> Self {
    Self {
      boxes: set.iter().map(|d| d.bbox).collect(),
      scores: set.iter().map(|d| d.score).collect(),
      labels: set.iter().map(|d| d.label).collect(),
      queries: None,
    }
  }
}

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("阈值无效: {0}")]
  InvalidThreshold(String),
  #[error("无法读取检测文件 {0}: {1}")]
  ReadError(PathBuf, std::io::Error),
  #[error("检测文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("检测文件长度不一致: boxes={boxes}, scores={scores}, labels={labels}")]
  LengthMismatch {
    boxes: usize,
    scores: usize,
    labels: usize,
  },
  #[error("查询列表不一致: 期望 {expected:?}, 文件中为 {found:?}")]
  QueryMismatch {
    expected: Vec<String>,
    found: Vec<String>,
  },
}

/// 回放检测器
///
/// 读取外部预训练模型在别处算好的检测结果。路径指向文件时每帧都使用同一个文件，
/// 指向目录时读取 `<目录>/<帧名称>.json`。
#[derive(Debug, Clone)]
pub struct ReplayDetector {
  path: PathBuf,
  threshold: Option<f32>,
}

impl FromUrlWithScheme for ReplayDetector {
  const SCHEME: &'static str = "detections";
}

impl FromUrl for ReplayDetector {
  type Error = ReplayDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayDetectorError::SchemeMismatch(format!(
        "检测器路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let threshold = match url_query(url, "threshold") {
      Some(v) => Some(
        v.parse::<f32>()
          .map_err(|_| ReplayDetectorError::InvalidThreshold(v.clone()))?,
      ),
      None => None,
    };

    let detector = ReplayDetector::new(url_path(url)).with_threshold(threshold);
    info!("回放检测结果: {}", detector.path.display());
    Ok(detector)
  }
}

impl ReplayDetector {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      threshold: None,
    }
  }

  pub fn with_threshold(mut self, threshold: Option<f32>) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn file_for(&self, frame: &Frame) -> PathBuf {
    if self.path.is_dir() {
      self.path.join(format!("{}.json", frame.name))
    } else {
      self.path.clone()
    }
  }

  fn load(&self, path: &Path) -> Result<ReplayFile, ReplayDetectorError> {
    let content =
      std::fs::read_to_string(path).map_err(|e| ReplayDetectorError::ReadError(path.into(), e))?;
    Ok(serde_json::from_str(&content)?)
  }
}

impl Detector for ReplayDetector {
  type Error = ReplayDetectorError;

  fn detect(&self, frame: &Frame, queries: &Queries) -> Result<DetectionSet, Self::Error> {
    let path = self.file_for(frame);
    debug!("帧 {} 读取检测文件 {}", frame.name, path.display());

    let mut file = self.load(&path)?;
    if let Some(found) = file.queries.take()
      && found.as_slice() != queries.as_slice()
    {
      return Err(ReplayDetectorError::QueryMismatch {
        expected: queries.as_slice().to_vec(),
        found,
      });
    }

    let detections = file.into_detections()?;
    let detections = match self.threshold {
      Some(threshold) => detections.above(threshold).copied().collect::<DetectionSet>(),
      None => detections,
    };

    if let Some(d) = detections.iter().find(|d| d.label >= queries.len()) {
      warn!(
        "检测文件 {} 含有超出查询范围的标签 {} (共 {} 个查询)",
        path.display(),
        d.label,
        queries.len()
      );
    }

    debug!("帧 {} 共 {} 个检测结果", frame.name, detections.len());
    Ok(detections)
  }
}
