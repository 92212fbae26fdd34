// 该文件是 Kanjian （看见） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod query;
pub mod select;
pub mod task;

use std::path::PathBuf;

pub use self::model::{Detection, DetectionSet, Detector};
pub use self::query::Queries;
pub use self::select::{BestBox, BestBoxOutput, BestBoxes, SelectError, select_best_boxes};

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 取出 URL 中经过百分号解码的路径
pub fn url_path(url: &url::Url) -> PathBuf {
  match urlencoding::decode(url.path()) {
    Ok(path) => PathBuf::from(path.into_owned()),
    Err(_) => PathBuf::from(url.path()),
  }
}

/// 读取 URL 查询参数中的某个键
pub fn url_query(url: &url::Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_path_is_percent_decoded() {
    let url = url::Url::parse("image:///tmp/my%20photo.png").unwrap();
    assert_eq!(url_path(&url), PathBuf::from("/tmp/my photo.png"));
  }

  #[test]
  fn url_query_finds_first_value() {
    let url = url::Url::parse("folder:///tmp/out?record=json&always").unwrap();
    assert_eq!(url_query(&url, "record").as_deref(), Some("json"));
    assert_eq!(url_query(&url, "always").as_deref(), Some(""));
    assert_eq!(url_query(&url, "font"), None);
  }
}
