// 该文件是 Kanjian （看见） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kanjian::{
  FromUrl, Queries,
  input::InputWrapper,
  model::ReplayDetector,
  output::{NoOutput, OutputWrapper},
  task::{ContinuousTask, FrameResult, OneShotTask, Task},
};

use args::{Args, OutputFormat, log_level};

fn print_results(results: &[FrameResult], format: OutputFormat) -> Result<()> {
  match format {
    OutputFormat::Json => {
      let value = results
        .iter()
        .map(|r| match &r.best {
          Ok(best) => json!({
            "frame": r.frame,
            "boxes": best.clone().into_output(),
            "best_boxes": best,
          }),
          Err(e) => json!({
            "frame": r.frame,
            "error": e.to_string(),
          }),
        })
        .collect::<Vec<_>>();
      println!("{}", serde_json::to_string_pretty(&value)?);
    }
    OutputFormat::Text => {
      for r in results {
        println!("图像: {}", r.frame);
        match &r.best {
          Ok(best) => {
            for b in best.iter() {
              println!(
                "  {}: [{}, {}, {}, {}] (置信度 {:.3})",
                b.query, b.bbox[0], b.bbox[1], b.bbox[2], b.bbox[3], b.score
              );
            }
          }
          Err(e) => println!("  失败: {}", e),
        }
      }
    }
  }
  Ok(())
}

fn main() -> Result<()> {
  let args = Args::parse();

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(args.verbose)));
  tracing_subscriber::fmt().with_env_filter(filter).init();

  info!("检测器地址: {}", args.detector);
  info!("输入来源: {}", args.input);
  if let Some(output) = &args.output {
    info!("输出路径: {}", output);
  }

  let queries = match &args.queries {
    Some(path) => Queries::from_toml_file(path)?,
    None => Queries::new(args.query.clone())?,
  };
  info!("查询列表: {:?}", queries.as_slice());

  let detector = ReplayDetector::from_url(&args.detector)?;
  let input = InputWrapper::from_url(&args.input)?;
  let output = args.output.as_ref().map(OutputWrapper::from_url).transpose()?;

  let results = if matches!(input, InputWrapper::ReadImageFile(_)) {
    let task = OneShotTask::new(queries).with_score_threshold(args.score_threshold);
    let result = match output {
      Some(output) => task.run_task(input, &detector, output)?,
      None => task.run_task(input, &detector, NoOutput)?,
    };
    vec![result]
  } else {
    let frame_number = (args.max_frames > 0).then_some(args.max_frames);
    let task = ContinuousTask::new(queries)
      .with_score_threshold(args.score_threshold)
      .with_frame_number(frame_number)
      .interruptible(true);
    match output {
      Some(output) => task.run_task(input, &detector, output)?,
      None => task.run_task(input, &detector, NoOutput)?,
    }
  };

  print_results(&results, args.format)?;

  let failed = results.iter().filter(|r| r.best.is_err()).count();
  info!("处理完成! 总帧数: {}, 失败: {}", results.len(), failed);

  Ok(())
}
