// 该文件是 Kanjian （看见） 项目的一部分。
// src/task.rs - 检测任务
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

use std::{thread, time::Duration};
use tracing::{info, warn};

use crate::{
  frame::Frame,
  model::{DetectionSet, Detector},
  output::Render,
  query::Queries,
  select::{BestBoxes, SelectError, select_best_boxes},
};

/// 原始检测结果报告的默认置信度阈值
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.1;

pub trait Task<I, D, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, detector: D, output: O) -> Result<Self::Output, Self::Error>;
}

/// 单帧的处理结果
#[derive(Debug, Clone)]
pub struct FrameResult {
  pub frame: String,
  pub best: Result<BestBoxes, SelectError>,
}

/// 记录置信度不低于阈值的全部原始检测结果
pub fn log_detections(frame: &Frame, queries: &Queries, detections: &DetectionSet, threshold: f32) {
  for d in detections.above(threshold) {
    let query = queries.get(d.label).unwrap_or("<未知>");
    let bbox = d.bbox.map(|v| (v * 100.0).round() / 100.0);
    info!(
      "[{}] 检测到 {}, 置信度 {:.3}, 位置 {:?}",
      frame.name, query, d.score, bbox
    );
  }
}

fn log_best_boxes(frame: &Frame, best: &BestBoxes) {
  for b in best.iter() {
    info!(
      "[{}] {} 的最佳检测框: {:?} (置信度 {:.3})",
      frame.name, b.query, b.bbox, b.score
    );
  }
}

#[derive(Debug, Clone)]
pub struct OneShotTask {
  queries: Queries,
  score_threshold: f32,
}

impl OneShotTask {
  pub fn new(queries: Queries) -> Self {
    Self {
      queries,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
    }
  }

  pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
    self.score_threshold = score_threshold;
    self
  }
}

impl<
  DE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  D: Detector<Error = DE>,
  O: Render<Frame, BestBoxes, Error = RE>,
> Task<I, D, O> for OneShotTask
{
  type Output = FrameResult;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: D, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let detections = detector.detect(&frame, &self.queries)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}, 共 {} 个检测结果", elapsed, detections.len());
    log_detections(&frame, &self.queries, &detections, self.score_threshold);

    let best = select_best_boxes(&self.queries, &detections)?;
    log_best_boxes(&frame, &best);

    output.render_result(&frame, &best)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(FrameResult {
      frame: frame.name,
      best: Ok(best),
    })
  }
}

#[derive(Debug, Clone)]
pub struct ContinuousTask {
  queries: Queries,
  score_threshold: f32,
  frame_number: Option<usize>,
  interruptible: bool,
}

impl ContinuousTask {
  pub fn new(queries: Queries) -> Self {
    Self {
      queries,
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      frame_number: None,
      interruptible: false,
    }
  }

  pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
    self.score_threshold = score_threshold;
    self
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理器，收到信号后处理完当前帧即退出；每个进程只能安装一次
  pub fn interruptible(mut self, interruptible: bool) -> Self {
    self.interruptible = interruptible;
    self
  }
}

impl<
  DE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  D: Detector<Error = DE>,
  O: Render<Frame, BestBoxes, Error = RE>,
> Task<I, D, O> for ContinuousTask
{
  type Output = Vec<FrameResult>;
  type Error = anyhow::Error;

  fn run_task(self, input: I, detector: D, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    if self.interruptible {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let mut results = Vec::new();
    let mut frame_index = 0usize;
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像: {}", frame_index, frame.name);

      let now = std::time::Instant::now();
      let detections = detector.detect(&frame, &self.queries)?;
      let elapsed_a = now.elapsed();
      log_detections(&frame, &self.queries, &detections, self.score_threshold);

      let best = match select_best_boxes(&self.queries, &detections) {
        Ok(best) => {
          log_best_boxes(&frame, &best);
          output.render_result(&frame, &best)?;
          Ok(best)
        }
        Err(e) => {
          warn!("[{}] 跳过该帧: {}", frame.name, e);
          Err(e)
        }
      };
      let elapsed_b = now.elapsed();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);

      results.push(FrameResult {
        frame: frame.name,
        best,
      });

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(results)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Detection;
  use crate::output::NoOutput;
  use image::RgbImage;
  use std::cell::RefCell;

  /// 按帧名称返回固定检测结果的检测器
  struct FixedDetector {
    calls: RefCell<usize>,
  }

  impl Detector for FixedDetector {
    type Error = std::io::Error;

    fn detect(&self, frame: &Frame, _queries: &Queries) -> Result<DetectionSet, Self::Error> {
      *self.calls.borrow_mut() += 1;
      let items = match frame.name.as_str() {
        "both" => vec![
          Detection {
            label: 0,
            score: 0.3,
            bbox: [0.0, 0.0, 10.0, 10.0],
          },
          Detection {
            label: 1,
            score: 0.8,
            bbox: [5.0, 5.0, 15.0, 15.0],
          },
        ],
        "cat-only" => vec![Detection {
          label: 0,
          score: 0.9,
          bbox: [1.0, 1.0, 2.0, 2.0],
        }],
        _ => return Err(std::io::Error::other("模型失败")),
      };
      Ok(items.into())
    }
  }

  /// 记录被渲染的帧名称
  struct Collect(RefCell<Vec<String>>);

  impl Render<Frame, BestBoxes> for &Collect {
    type Error = std::convert::Infallible;

    fn render_result(&self, frame: &Frame, _result: &BestBoxes) -> Result<(), Self::Error> {
      self.0.borrow_mut().push(frame.name.clone());
      Ok(())
    }
  }

  fn frames(names: &[&str]) -> Vec<Frame> {
    names
      .iter()
      .map(|n| Frame::new(*n, RgbImage::new(4, 4)))
      .collect()
  }

  fn queries() -> Queries {
    Queries::try_from(&["cat", "dog"][..]).unwrap()
  }

  fn detector() -> FixedDetector {
    FixedDetector {
      calls: RefCell::new(0),
    }
  }

  #[test]
  fn one_shot_uses_first_frame_only() {
    let detector = detector();
    let result = OneShotTask::new(queries())
      .run_task(frames(&["both", "cat-only"]).into_iter(), &detector, NoOutput)
      .unwrap();
    assert_eq!(result.frame, "both");
    assert_eq!(
      result.best.unwrap().boxes(),
      vec![[0, 0, 10, 10], [5, 5, 15, 15]]
    );
    assert_eq!(*detector.calls.borrow(), 1);
  }

  #[test]
  fn one_shot_fails_on_missing_label() {
    let err = OneShotTask::new(queries())
      .run_task(frames(&["cat-only"]).into_iter(), &detector(), NoOutput)
      .unwrap_err();
    assert!(matches!(
      err.downcast_ref::<SelectError>(),
      Some(SelectError::EmptyDetection { index: 1, .. })
    ));
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let result = OneShotTask::new(queries()).run_task(Vec::<Frame>::new().into_iter(), &detector(), NoOutput);
    assert!(result.is_err());
  }

  #[test]
  fn continuous_skips_failed_selection_and_reuses_detector() {
    let detector = detector();
    let collect = Collect(RefCell::new(Vec::new()));
    let results = ContinuousTask::new(queries())
      .run_task(
        frames(&["both", "cat-only", "both"]).into_iter(),
        &detector,
        &collect,
      )
      .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].best.is_ok());
    assert!(results[1].best.is_err());
    assert_eq!(*detector.calls.borrow(), 3);
    assert_eq!(*collect.0.borrow(), vec!["both", "both"]);
  }

  #[test]
  fn continuous_respects_frame_number() {
    let results = ContinuousTask::new(queries())
      .with_frame_number(Some(2))
      .run_task(frames(&["both", "both", "both"]).into_iter(), &detector(), NoOutput)
      .unwrap();
    assert_eq!(results.len(), 2);
  }

  #[test]
  fn continuous_propagates_detector_errors() {
    let result = ContinuousTask::new(queries()).run_task(
      frames(&["both", "broken"]).into_iter(),
      &detector(),
      NoOutput,
    );
    assert!(result.is_err());
  }
}
