// 该文件是 Kanjian （看见） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::{ArgGroup, Parser, ValueEnum};
use url::Url;

use kanjian::task::DEFAULT_SCORE_THRESHOLD;

/// 结果输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  Text,
  Json,
}

/// Kanjian 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("query_source").required(true).args(["query", "queries"])))]
pub struct Args {
  /// 检测器地址
  /// 支持格式:
  /// - detections:///path/out.json 每帧使用同一个检测文件
  /// - detections:///path/dir 读取 <dir>/<帧名称>.json
  /// - 可附加 ?threshold=0.1 在读取时丢弃低置信度检测
  #[arg(long, value_name = "DETECTOR")]
  pub detector: Url,

  /// 输入来源
  /// 支持格式:
  /// - image:///path/image.png 单张图像
  /// - folder:///path/dir 目录中的全部图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径（可选）
  /// 支持格式:
  /// - image:///path/out.png[?font=/path/font.ttf]
  /// - folder:///path/dir[?record=json|name|id][&font=...]
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,

  /// 文本查询，可重复，顺序即标签索引
  #[arg(long, short = 'q', value_name = "TEXT")]
  pub query: Vec<String>,

  /// 查询列表文件（TOML，queries = [...]）
  #[arg(long, value_name = "FILE", conflicts_with = "query")]
  pub queries: Option<PathBuf>,

  /// 原始检测结果报告的置信度阈值
  #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD, value_name = "THRESHOLD")]
  pub score_threshold: f32,

  /// 结果输出格式
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  pub format: OutputFormat,

  /// 最大处理帧数（仅对目录输入有效，0 表示无限制）
  #[arg(long, default_value_t = 0, value_name = "COUNT")]
  pub max_frames: usize,

  /// 日志详细程度（-v, -vv）
  #[arg(short, action = clap::ArgAction::Count)]
  pub verbose: u8,
}

/// 根据 -v 次数得到日志级别
pub fn log_level(verbose: u8) -> &'static str {
  match verbose {
    0 => "info",
    1 => "debug",
    _ => "trace",
  }
}
