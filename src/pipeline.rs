// 该文件是 Cheshang （车伤） 项目的一部分。
// src/pipeline.rs - 检测结果后处理
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

//! 把检测器的原始输出变成带标签的检测结果、标注图像和损伤评估。
//!
//! 处理顺序固定：置信度过滤、类别映射、置信度量化、绘制、评估。
//! 任何一个检测的类别映射失败都会让整张图像的处理失败。

use image::RgbImage;
use serde::Serialize;
use tracing::debug;

use crate::{
  model::{DamageLabel, DetectResult, LabelMappingError, WithLabel},
  output::draw::{Draw, DrawDetectionOnImage},
};

/// 置信度不高于该值的检测会被丢弃
pub const CONFIDENCE_THRESHOLD: f32 = 0.30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledDetection {
  pub bbox: [f32; 4],
  pub class_id: u32,
  pub label: DamageLabel,
  /// 量化后的置信度，见 [`quantize_confidence`]
  pub confidence: f32,
}

/// 把置信度向上取整到百分位：`ceil(c * 100) / 100`。
///
/// 结果是 `f32` 表示不小于 `c` 的最小百分位数，因此 `0.6f32` 仍得到 `0.6`，
/// 而不会因为浮点误差被抬到 `0.61`。
pub fn quantize_confidence(confidence: f32) -> f32 {
  let scaled = (f64::from(confidence) * 100.0).ceil();
  let below = ((scaled - 1.0) / 100.0) as f32;
  if below >= confidence {
    below
  } else {
    (scaled / 100.0) as f32
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeverityTier {
  Low,
  Medium,
  High,
}

impl SeverityTier {
  /// 按检测数量分级，没有检测时返回 `None`
  pub fn from_count(count: usize) -> Option<Self> {
    match count {
      0 => None,
      1 => Some(SeverityTier::Low),
      2 => Some(SeverityTier::Medium),
      _ => Some(SeverityTier::High),
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      SeverityTier::Low => "Low",
      SeverityTier::Medium => "Medium",
      SeverityTier::High => "High",
    }
  }

  pub fn marker(&self) -> &'static str {
    match self {
      SeverityTier::Low => "🟢",
      SeverityTier::Medium => "🟡",
      SeverityTier::High => "🔴",
    }
  }
}

impl std::fmt::Display for SeverityTier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityAssessment {
  pub count: usize,
  pub mean_confidence: f32,
  pub tier: SeverityTier,
}

pub fn assess_severity(detections: &[LabeledDetection]) -> Option<SeverityAssessment> {
  let tier = SeverityTier::from_count(detections.len())?;
  let count = detections.len();
  let mean_confidence = detections.iter().map(|d| d.confidence).sum::<f32>() / count as f32;
  Some(SeverityAssessment {
    count,
    mean_confidence,
    tier,
  })
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
  pub annotated: RgbImage,
  pub detections: Vec<LabeledDetection>,
  pub severity: Option<SeverityAssessment>,
}

#[derive(Clone)]
pub struct PostProcessor {
  draw: Draw,
}

impl PostProcessor {
  pub fn new(draw: Draw) -> Self {
    Self { draw }
  }

  /// 过滤低置信度检测并映射类别，保持检测器给出的顺序
  pub fn label(&self, result: &DetectResult) -> Result<Vec<LabeledDetection>, LabelMappingError> {
    result
      .items
      .iter()
      .filter(|item| item.confidence > CONFIDENCE_THRESHOLD)
      .map(|item| {
        Ok(LabeledDetection {
          bbox: item.bbox,
          class_id: item.class_id,
          label: DamageLabel::from_label_id(item.class_id)?,
          confidence: quantize_confidence(item.confidence),
        })
      })
      .collect()
  }

  pub fn process(
    &self,
    image: &RgbImage,
    result: &DetectResult,
  ) -> Result<PipelineOutput, LabelMappingError> {
    let detections = self.label(result)?;
    debug!(
      "置信度过滤: {} -> {} 个检测",
      result.len(),
      detections.len()
    );

    let mut annotated = image.clone();
    self
      .draw
      .draw_detections_on_image(&mut annotated, &detections);

    let severity = assess_severity(&detections);
    Ok(PipelineOutput {
      annotated,
      detections,
      severity,
    })
  }
}
