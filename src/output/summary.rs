// 该文件是 Cheshang （车伤） 项目的一部分。
// src/output/summary.rs - 检测表格与评估摘要
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

use std::convert::Infallible;

use image::RgbImage;
use tracing::info;

use crate::{
  model::WithLabel,
  output::Render,
  pipeline::{LabeledDetection, PipelineOutput, SeverityAssessment},
};

pub const NO_DAMAGE_MESSAGE: &str = "No damage detected in the image.";

/// 0.95 -> "95.00%"
pub fn format_percent(value: f32) -> String {
  format!("{:.2}%", f64::from(value) * 100.0)
}

pub struct DetectionRow {
  pub damage_type: &'static str,
  pub confidence: String,
}

pub fn detection_rows(detections: &[LabeledDetection]) -> Vec<DetectionRow> {
  detections
    .iter()
    .map(|d| DetectionRow {
      damage_type: d.label.to_label_str(),
      confidence: format_percent(d.confidence),
    })
    .collect()
}

pub fn assessment_lines(severity: &SeverityAssessment) -> [String; 3] {
  [
    format!("Number of damages detected: {}", severity.count),
    format!(
      "Average confidence score: {}",
      format_percent(severity.mean_confidence)
    ),
    format!(
      "Estimated severity: {} {}",
      severity.tier.marker(),
      severity.tier
    ),
  ]
}

/// 把表格和评估写到日志，命令行模式使用
pub struct LogSummaryOutput;

impl Render<RgbImage, PipelineOutput> for LogSummaryOutput {
  type Error = Infallible;

  fn render_result(&self, frame: &RgbImage, result: &PipelineOutput) -> Result<(), Self::Error> {
    info!("图像尺寸: {}x{}", frame.width(), frame.height());
    let Some(severity) = result.severity.as_ref() else {
      info!("{}", NO_DAMAGE_MESSAGE);
      return Ok(());
    };

    info!("Detected Damages:");
    for (i, row) in detection_rows(&result.detections).iter().enumerate() {
      info!("  {}. {} ({})", i + 1, row.damage_type, row.confidence);
    }
    info!("Overall Assessment:");
    for line in assessment_lines(severity) {
      info!("  - {}", line);
    }
    Ok(())
  }
}
