// 该文件是 Kanjian （看见） 项目的一部分。
// src/query.rs - 文本查询列表
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

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::select::SelectError;

/// 有序的文本查询列表，查询在列表中的位置即其标签索引
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queries {
  items: Box<[String]>,
}

#[derive(Error, Debug)]
pub enum QueryFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("查询文件解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("{0}")]
  Invalid(#[from] SelectError),
}

#[derive(Deserialize)]
struct QueryFile {
  queries: Vec<String>,
}

impl Queries {
  pub fn new(items: Vec<String>) -> Result<Self, SelectError> {
    if items.is_empty() {
      return Err(SelectError::InvalidQueryList);
    }
    Ok(Self {
      items: items.into_boxed_slice(),
    })
  }

  /// 从 TOML 文件读取查询列表，格式为 `queries = ["cat", "dog"]`
  pub fn from_toml_file(path: &Path) -> Result<Self, QueryFileError> {
    let content = std::fs::read_to_string(path)?;
    let queries = Self::from_toml_str(&content)?;
    debug!("从 {} 读取 {} 个查询", path.display(), queries.len());
    Ok(queries)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, QueryFileError> {
    let file: QueryFile = toml::from_str(content)?;
    Ok(Self::new(file.queries)?)
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  // 构造时已保证非空
  pub fn is_empty(&self) -> bool {
    false
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.items.get(index).map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.items.iter().map(String::as_str)
  }

  pub fn as_slice(&self) -> &[String] {
    &self.items
  }
}

impl TryFrom<Vec<String>> for Queries {
  type Error = SelectError;

  fn try_from(items: Vec<String>) -> Result<Self, Self::Error> {
    Self::new(items)
  }
}

impl TryFrom<&[&str]> for Queries {
  type Error = SelectError;

  fn try_from(items: &[&str]) -> Result<Self, Self::Error> {
    Self::new(items.iter().map(|s| s.to_string()).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_query_list_is_rejected() {
    let err = Queries::new(Vec::new()).unwrap_err();
    assert_eq!(err, SelectError::InvalidQueryList);
  }

  #[test]
  fn position_is_label_index() {
    let queries = Queries::try_from(&["cat", "a photo of a remote"][..]).unwrap();
    assert_eq!(queries.len(), 2);
    assert_eq!(queries.get(0), Some("cat"));
    assert_eq!(queries.get(1), Some("a photo of a remote"));
    assert_eq!(queries.get(2), None);
  }

  #[test]
  fn loads_from_toml() {
    let queries = Queries::from_toml_str(r#"queries = ["toaster", "kettle"]"#).unwrap();
    assert_eq!(queries.iter().collect::<Vec<_>>(), vec!["toaster", "kettle"]);
  }

  #[test]
  fn empty_toml_list_is_invalid() {
    let err = Queries::from_toml_str("queries = []").unwrap_err();
    assert!(matches!(
      err,
      QueryFileError::Invalid(SelectError::InvalidQueryList)
    ));
  }

  #[test]
  fn malformed_toml_is_parse_error() {
    let err = Queries::from_toml_str("queries = \"toaster\"").unwrap_err();
    assert!(matches!(err, QueryFileError::ParseError(_)));
  }
}
