// 该文件是 Cheshang （车伤） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{model::WithLabel, pipeline::LabeledDetection};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_PADDING: i32 = 4;
const LABEL_OFFSET: i32 = 10; // 标签底边距离框顶的像素
const LABEL_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_COLOR: [u8; 3] = [255, 0, 255]; // 品红
const CORNER_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const CORNER_LENGTH: i32 = 30;
const CORNER_THICKNESS: i32 = 2;

/// 未指定字体时依次尝试的系统字体
const FALLBACK_FONTS: [&str; 4] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
  "/Library/Fonts/Arial Unicode.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O error while reading font: {0}")]
  IoError(#[from] std::io::Error),
  #[error("invalid font file: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

#[derive(Clone)]
pub struct Draw {
  font_size: f32,
  label_text_padding: i32,
  font: Option<FontArc>,
  label_color: [u8; 3],
  box_color: [u8; 3],
  corner_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    let font = FALLBACK_FONTS.iter().find_map(|path| {
      let font = load_font(Path::new(path)).ok()?;
      debug!("使用系统字体: {}", path);
      Some(font)
    });
    if font.is_none() {
      info!("未找到可用字体，标注将只绘制检测框");
    }
    Self::with_font(font)
  }
}

fn load_font(path: &Path) -> Result<FontArc, DrawError> {
  let data = std::fs::read(path)?;
  Ok(FontArc::try_from_vec(data)?)
}

impl Draw {
  pub fn with_font(font: Option<FontArc>) -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_padding: LABEL_TEXT_PADDING,
      font,
      label_color: LABEL_COLOR,
      box_color: BOX_COLOR,
      corner_color: CORNER_COLOR,
    }
  }

  pub fn with_font_file(path: &Path) -> Result<Self, DrawError> {
    Ok(Self::with_font(Some(load_font(path)?)))
  }

  /// 在图像上绘制一个边框和标签，bbox 为像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label(&self, image: &mut RgbImage, bbox: &[f32; 4], caption: &str) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    let box_w = (x_max - x_min + 1) as u32;
    let box_h = (y_max - y_min + 1) as u32;
    draw_hollow_rect_mut(
      image,
      Rect::at(x_min, y_min).of_size(box_w, box_h),
      Rgb(self.box_color),
    );

    // 四角加粗
    let len = CORNER_LENGTH.min(box_w as i32 / 2).max(1);
    let t = CORNER_THICKNESS.min(len);
    let corner = Rgb(self.corner_color);
    for (x, y, dx, dy) in [
      (x_min, y_min, 1, 1),
      (x_max, y_min, -1, 1),
      (x_min, y_max, 1, -1),
      (x_max, y_max, -1, -1),
    ] {
      let len_y = len.min(box_h as i32 / 2).max(1);
      let t_y = t.min(len_y);
      let hx = if dx > 0 { x } else { x - len + 1 };
      let hy = if dy > 0 { y } else { y - t_y + 1 };
      draw_filled_rect_mut(
        image,
        Rect::at(hx, hy).of_size(len as u32, t_y as u32),
        corner,
      );
      let vx = if dx > 0 { x } else { x - t + 1 };
      let vy = if dy > 0 { y } else { y - len_y + 1 };
      draw_filled_rect_mut(
        image,
        Rect::at(vx, vy).of_size(t as u32, len_y as u32),
        corner,
      );
    }

    let Some(font) = self.font.as_ref() else {
      return;
    };

    let scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]); // 白色文本
    let (text_w, text_h) = text_size(scale, font, caption);
    let label_w = text_w as i32 + 2 * self.label_text_padding;
    let label_h = text_h as i32 + 2 * self.label_text_padding;

    // 标签放在边框上方，超出顶部时贴着图像上沿
    let label_x = x_min;
    let label_y = (y_min - LABEL_OFFSET - label_h).max(0);

    let label_w = label_w.min(w - label_x).max(0) as u32;
    if label_w == 0 || label_h <= 0 {
      return;
    }

    draw_filled_rect_mut(
      image,
      Rect::at(label_x, label_y).of_size(label_w, label_h as u32),
      Rgb(self.label_color),
    );
    draw_text_mut(
      image,
      text_color,
      label_x + self.label_text_padding,
      label_y + self.label_text_padding,
      scale,
      font,
      caption,
    );
  }
}

pub trait DrawDetectionOnImage {
  fn draw_detections_on_image(&self, image: &mut RgbImage, detections: &[LabeledDetection]);
}

impl DrawDetectionOnImage for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, detections: &[LabeledDetection]) {
    // 按检测器给出的顺序逐个绘制，重叠的框不做处理
    for detection in detections {
      let caption = format!(
        "{} {}",
        detection.label.to_label_str(),
        detection.confidence
      );
      self.draw_bbox_with_label(image, &detection.bbox, &caption);
    }
  }
}

pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn format(&self, detections: &[LabeledDetection]) -> String {
    let mut records = Vec::new();
    for item in detections {
      let name = if self.label_with_name {
        item.label.to_label_str().to_string()
      } else {
        format!("{}", item.label.to_label_id())
      };
      let record = format!(
        "{}, {:.2}, {:.1}, {:.1}, {:.1}, {:.1}",
        name, item.confidence, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
      );
      records.push(record);
    }
    records.join("\n")
  }

  pub fn record(
    &self,
    detections: &[LabeledDetection],
    path: &Path,
  ) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.format(detections))?;
    Ok(())
  }
}
