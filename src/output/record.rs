// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/record.rs - 检测结果文本记录
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

use serde::Serialize;

use crate::select::{BestBox, BestBoxes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
  /// 每行 `查询, 置信度, x_min, y_min, x_max, y_max`
  Text { label_with_name: bool },
  Json,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
  frame: &'a str,
  best_boxes: &'a [BestBox],
}

pub struct Record {
  pub format: RecordFormat,
}

impl Record {
  pub fn render(&self, frame_name: &str, result: &BestBoxes) -> String {
    match self.format {
      RecordFormat::Text { label_with_name } => result
        .iter()
        .map(|item| {
          let name = if label_with_name {
            item.query.clone()
          } else {
            item.label.to_string()
          };
          format!(
            "{}, {:.4}, {}, {}, {}, {}",
            name, item.score, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
          )
        })
        .collect::<Vec<_>>()
        .join("\n"),
      RecordFormat::Json => {
        let record = JsonRecord {
          frame: frame_name,
          best_boxes: &result.items,
        };
        serde_json::to_string_pretty(&record).unwrap_or_default()
      }
    }
  }

  /// 将记录写到与 `path` 同名、扩展名为 txt 或 json 的文件
  pub fn record(
    &self,
    frame_name: &str,
    result: &BestBoxes,
    path: &Path,
  ) -> Result<(), std::io::Error> {
    let extension = match self.format {
      RecordFormat::Text { .. } => "txt",
      RecordFormat::Json => "json",
    };
    std::fs::write(path.with_extension(extension), self.render(frame_name, result))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result() -> BestBoxes {
    BestBoxes {
      items: vec![
        BestBox {
          label: 0,
          query: "cat".to_string(),
          score: 0.3,
          bbox: [0, 0, 10, 10],
        },
        BestBox {
          label: 1,
          query: "dog".to_string(),
          score: 0.8,
          bbox: [5, 5, 15, 15],
        },
      ]
      .into_boxed_slice(),
    }
  }

  #[test]
  fn text_record_by_name_and_id() {
    let by_name = Record {
      format: RecordFormat::Text {
        label_with_name: true,
      },
    };
    assert_eq!(
      by_name.render("f", &result()),
      "cat, 0.3000, 0, 0, 10, 10\ndog, 0.8000, 5, 5, 15, 15"
    );

    let by_id = Record {
      format: RecordFormat::Text {
        label_with_name: false,
      },
    };
    assert!(by_id.render("f", &result()).starts_with("0, 0.3000"));
  }

  #[test]
  fn json_record_lists_best_boxes() {
    let record = Record {
      format: RecordFormat::Json,
    };
    let value: serde_json::Value = serde_json::from_str(&record.render("kitchen", &result())).unwrap();
    assert_eq!(value["frame"], "kitchen");
    assert_eq!(value["best_boxes"][1]["query"], "dog");
    assert_eq!(value["best_boxes"][1]["bbox"], serde_json::json!([5, 5, 15, 15]));
  }
}
