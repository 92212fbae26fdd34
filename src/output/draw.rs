// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/draw.rs - 最佳检测框可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::Frame,
  select::{BestBox, BestBoxes},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;

// 按查询索引循环使用的边框颜色
const PALETTE: [[u8; 3]; 6] = [
  [0, 0, 255],
  [255, 0, 0],
  [0, 160, 0],
  [255, 128, 0],
  [160, 0, 160],
  [0, 160, 160],
];

#[derive(Error, Debug)]
#[error("无法加载字体: {0}")]
pub struct FontLoadError(pub String);

pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  thickness: i32,
  /// 未设置字体时只画边框，不画标签文本
  font: Option<FontArc>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      thickness: BOX_THICKNESS,
      font: None,
    }
  }
}

pub fn label_color(label: usize) -> [u8; 3] {
  PALETTE[label % PALETTE.len()]
}

impl Draw {
  pub fn with_font_file(mut self, path: &Path) -> Result<Self, FontLoadError> {
    let data = std::fs::read(path).map_err(|e| FontLoadError(format!("{}: {}", path.display(), e)))?;
    let font =
      FontArc::try_from_vec(data).map_err(|e| FontLoadError(format!("{}: {}", path.display(), e)))?;
    debug!("加载字体文件: {}", path.display());
    self.font = Some(font);
    Ok(self)
  }

  /// 按可选的字体路径构造
  pub fn with_optional_font(path: Option<&Path>) -> Result<Self, FontLoadError> {
    match path {
      Some(path) => Self::default().with_font_file(path),
      None => Ok(Self::default()),
    }
  }

  // 在图像上绘制一个矩形边框，bbox 为像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &BestBox) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }
    let color = Rgb(label_color(item.label));

    let x_min = item.bbox[0].clamp(0, w - 1);
    let y_min = item.bbox[1].clamp(0, h - 1);
    let x_max = item.bbox[2].clamp(0, w - 1);
    let y_max = item.bbox[3].clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      debug!("跳过退化的检测框: {:?}", item.bbox);
      return;
    }

    // 边框向内加粗
    for t in 0..self.thickness {
      let width = x_max - x_min + 1 - 2 * t;
      let height = y_max - y_min + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = &self.font else {
      return;
    };

    // 创建标签文本
    let label = format!("{} {:.2}", item.query, item.score);
    let scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]);

    let text_width = (label.chars().count() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签背景放在边框上方
    let label_x = x_min;
    let label_y = (y_min - text_height).max(0);

    let max_width = (w - label_x).max(0);
    let label_width = text_width.min(max_width) as u32;
    let label_height = text_height as u32;

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, color);

      draw_text_mut(
        image,
        text_color,
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        font,
        &label,
      );
    }
  }

  pub fn draw_on_image(&self, image: &mut RgbImage, result: &BestBoxes) {
    for item in result.iter() {
      self.draw_bbox_with_label(image, item);
    }
  }

  pub fn draw_on_frame(&self, frame: &Frame, result: &BestBoxes) -> RgbImage {
    let mut image = frame.image.clone();
    self.draw_on_image(&mut image, result);
    image
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(bbox: [i32; 4]) -> BestBoxes {
    BestBoxes {
      items: vec![BestBox {
        label: 0,
        query: "toaster".to_string(),
        score: 0.95,
        bbox,
      }]
      .into_boxed_slice(),
    }
  }

  #[test]
  fn draws_box_edges_in_label_color() {
    let mut image = RgbImage::new(20, 20);
    Draw::default().draw_on_image(&mut image, &result([2, 3, 12, 15]));

    let color = Rgb(label_color(0));
    assert_eq!(*image.get_pixel(2, 3), color);
    assert_eq!(*image.get_pixel(12, 15), color);
    assert_eq!(*image.get_pixel(3, 4), color);
    assert_eq!(*image.get_pixel(7, 9), Rgb([0, 0, 0]));
  }

  #[test]
  fn clamps_to_image_bounds() {
    let mut image = RgbImage::new(10, 10);
    Draw::default().draw_on_image(&mut image, &result([-5, -5, 50, 50]));
    let color = Rgb(label_color(0));
    assert_eq!(*image.get_pixel(0, 0), color);
    assert_eq!(*image.get_pixel(9, 9), color);
  }

  #[test]
  fn degenerate_box_draws_nothing() {
    let mut image = RgbImage::new(10, 10);
    Draw::default().draw_on_image(&mut image, &result([5, 5, 5, 8]));
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn missing_font_file_is_an_error() {
    let err = Draw::with_optional_font(Some(Path::new("/nonexistent/font.ttf")))
      .err()
      .unwrap();
    assert!(err.to_string().contains("font.ttf"));
  }
}
