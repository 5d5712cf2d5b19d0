// 该文件是 Cheshang （车伤） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use crate::model::RawDetection;

pub fn intersection_over_union(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x_min = a[0].max(b[0]);
  let y_min = a[1].max(b[1]);
  let x_max = a[2].min(b[2]);
  let y_max = a[3].min(b[3]);

  let intersection = (x_max - x_min).max(0.0) * (y_max - y_min).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union <= 0.0 { 0.0 } else { intersection / union }
}

/// 按类别做非极大值抑制，结果按置信度降序排列，最多保留 `max_detections` 个
pub fn non_maximum_suppression(
  mut detections: Vec<RawDetection>,
  iou_threshold: f32,
  max_detections: usize,
) -> Vec<RawDetection> {
  detections.sort_by(|a, b| {
    b.confidence
      .partial_cmp(&a.confidence)
      .unwrap_or(Ordering::Equal)
  });

  let mut keep: Vec<RawDetection> = Vec::with_capacity(detections.len().min(max_detections));
  for candidate in detections {
    if keep.len() >= max_detections {
      break;
    }
    let suppressed = keep.iter().any(|kept| {
      kept.class_id == candidate.class_id
        && intersection_over_union(&kept.bbox, &candidate.bbox) > iou_threshold
    });
    if !suppressed {
      keep.push(candidate);
    }
  }
  keep
}
