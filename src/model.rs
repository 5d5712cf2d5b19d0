// 该文件是 Cheshang （车伤） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 检测器对单张图像给出的一个候选区域
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDetection {
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，像素坐标
  pub class_id: u32,
  pub confidence: f32,
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[RawDetection]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }
}

impl From<Vec<RawDetection>> for DetectResult {
  fn from(items: Vec<RawDetection>) -> Self {
    DetectResult {
      items: items.into_boxed_slice(),
    }
  }
}

/// 推理后端失败，保留后端错误作为来源，核心流程不依赖具体后端类型
#[derive(Error, Debug)]
#[error("model inference failed: {0}")]
pub struct ModelInferenceError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

/// 核心流程所需的检测接口：输入预处理后的图像，输出原始检测结果
pub trait Detector: Send + Sync {
  fn detect(&self, image: &RgbImage) -> Result<DetectResult, ModelInferenceError>;
}

impl<M> Detector for M
where
  M: Model<Input = RgbImage, Output = DetectResult> + Send + Sync,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  fn detect(&self, image: &RgbImage) -> Result<DetectResult, ModelInferenceError> {
    self
      .infer(image)
      .map_err(|e| ModelInferenceError(Box::new(e)))
  }
}

mod label;
pub use self::label::{DAMAGE_LABEL_COUNT, DamageLabel, LabelMappingError, WithLabel};

#[cfg(feature = "model_onnx")]
mod yolo_onnx;
#[cfg(feature = "model_onnx")]
pub use self::yolo_onnx::{YoloOnnx, YoloOnnxBuilder, YoloOnnxError};

mod nms;
pub use self::nms::{intersection_over_union, non_maximum_suppression};
