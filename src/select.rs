// 该文件是 Kanjian （看见） 项目的一部分。
// src/select.rs - 每个查询选取置信度最高的检测框
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

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{
  model::{Detection, DetectionSet},
  query::Queries,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
  #[error("查询 {index} ({query}) 没有任何检测结果")]
  EmptyDetection { index: usize, query: String },
  #[error("查询列表为空")]
  InvalidQueryList,
}

/// 某个查询的最佳检测框
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestBox {
  pub label: usize,
  pub query: String,
  pub score: f32,
  pub bbox: [i32; 4], // [x_min, y_min, x_max, y_max]
}

/// 与查询列表一一对应的最佳检测框
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BestBoxes {
  pub items: Box<[BestBox]>,
}

/// 单个查询时直接给出检测框，多个查询时给出检测框序列
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BestBoxOutput {
  Single([i32; 4]),
  Many(Vec<[i32; 4]>),
}

impl BestBoxes {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, BestBox> {
    self.items.iter()
  }

  pub fn boxes(&self) -> Vec<[i32; 4]> {
    self.items.iter().map(|b| b.bbox).collect()
  }

  /// 只有一个查询时返回其检测框
  pub fn single(&self) -> Option<[i32; 4]> {
    match &*self.items {
      [only] => Some(only.bbox),
      _ => None,
    }
  }

  pub fn into_output(self) -> BestBoxOutput {
    match self.single() {
      Some(bbox) => BestBoxOutput::Single(bbox),
      None => BestBoxOutput::Many(self.boxes()),
    }
  }
}

fn round_bbox(bbox: &[f32; 4]) -> [i32; 4] {
  bbox.map(|v| v.round_ties_even() as i32)
}

/// 为每个查询选出置信度最高的检测框
///
/// 同分时取检测顺序中最先出现的一个；置信度为 NaN 的检测不参与比较；
/// 超出查询范围的标签被忽略。任何一个查询没有可用的检测时整个调用失败，
/// 不返回部分结果。坐标按“四舍六入五成双”取整。
pub fn select_best_boxes(
  queries: &Queries,
  detections: &DetectionSet,
) -> Result<BestBoxes, SelectError> {
  let mut best: Vec<Option<&Detection>> = vec![None; queries.len()];

  for detection in detections.iter() {
    let Some(slot) = best.get_mut(detection.label) else {
      debug!(
        "忽略超出查询范围的检测: 标签 {}, 置信度 {:.3}",
        detection.label, detection.score
      );
      continue;
    };
    if detection.score.is_nan() {
      continue;
    }
    if slot.is_none_or(|current| detection.score > current.score) {
      *slot = Some(detection);
    }
  }

  let items = best
    .into_iter()
    .zip(queries.iter())
    .enumerate()
    .map(|(index, (choice, query))| {
      let detection = choice.ok_or_else(|| SelectError::EmptyDetection {
        index,
        query: query.to_string(),
      })?;
      Ok(BestBox {
        label: index,
        query: query.to_string(),
        score: detection.score,
        bbox: round_bbox(&detection.bbox),
      })
    })
    .collect::<Result<Vec<_>, SelectError>>()?;

  Ok(BestBoxes {
    items: items.into_boxed_slice(),
  })
}
