// 该文件是 Kanjian （看见） 项目的一部分。
// src/model.rs - 模型
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

use crate::{frame::Frame, query::Queries};

/// 开放词汇检测器
///
/// 检测器句柄只创建一次，之后以引用方式传给需要它的任务。
/// 返回的检测框位于原始图像的像素坐标系中，标签为查询在列表中的位置。
pub trait Detector {
  type Error;

  fn detect(&self, frame: &Frame, queries: &Queries) -> Result<DetectionSet, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for &D {
  type Error = D::Error;

  fn detect(&self, frame: &Frame, queries: &Queries) -> Result<DetectionSet, Self::Error> {
    (**self).detect(frame, queries)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub label: usize,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

/// 一次推理产生的全部检测结果，顺序与检测器输出一致
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
  pub items: Box<[Detection]>,
}

impl DetectionSet {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  pub fn with_label(&self, label: usize) -> impl Iterator<Item = &Detection> {
    self.items.iter().filter(move |d| d.label == label)
  }

  /// 置信度不低于阈值的检测结果
  pub fn above(&self, threshold: f32) -> impl Iterator<Item = &Detection> {
    self.items.iter().filter(move |d| d.score >= threshold)
  }
}

impl From<Vec<Detection>> for DetectionSet {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl FromIterator<Detection> for DetectionSet {
  fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
    iter.into_iter().collect::<Vec<_>>().into()
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

mod replay;
pub use self::replay::{ReplayDetector, ReplayDetectorError, ReplayFile};

#[cfg(test)]
mod tests {
  use super::*;

  fn det(label: usize, score: f32) -> Detection {
    Detection {
      label,
      score,
      bbox: [0.0, 0.0, 1.0, 1.0],
    }
  }

  #[test]
  fn filters_by_label_and_threshold() {
    let set: DetectionSet = vec![det(0, 0.05), det(1, 0.4), det(0, 0.1)].into();
    assert_eq!(set.with_label(0).count(), 2);
    assert_eq!(set.with_label(2).count(), 0);
    let kept: Vec<_> = set.above(0.1).map(|d| d.score).collect();
    assert_eq!(kept, vec![0.4, 0.1]);
  }
}
