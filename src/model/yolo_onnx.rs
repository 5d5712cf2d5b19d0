// 该文件是 Cheshang （车伤） 项目的一部分。
// src/model/yolo_onnx.rs - ONNX Runtime 上的 YOLO 检测模型
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

use std::sync::{Mutex, MutexGuard};

use image::RgbImage;
use ort::{session::Session, value::Tensor};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNchwFrame,
  input::PREPARED_IMAGE_SIZE,
  model::{DetectResult, Model, RawDetection, non_maximum_suppression},
};

const YOLO_BOX_VALUES: usize = 4;
/// 导出模型时的默认候选阈值，后处理阶段还会再做一次阈值过滤
const YOLO_CANDIDATE_THRESH: f32 = 0.25;
const YOLO_NMS_IOU: f32 = 0.7;
const YOLO_MAX_DETECTIONS: usize = 300;

#[derive(Error, Debug)]
pub enum YoloOnnxError {
  #[error("model path error: {0}")]
  ModelPathError(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("ONNX Runtime error: {0}")]
  OrtError(#[from] ort::Error),
  #[error("unexpected model output: {0}")]
  OutputShape(String),
}

pub struct YoloOnnx {
  session: Mutex<Session>,
  input_size: usize,
  candidate_thresh: f32,
  nms_iou: f32,
}

pub struct YoloOnnxBuilder {
  model_path: String,
  input_size: usize,
  candidate_thresh: f32,
  nms_iou: f32,
}

impl FromUrlWithScheme for YoloOnnxBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for YoloOnnxBuilder {
  type Error = YoloOnnxError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloOnnxError::ModelPathError(format!(
        "model url must use the '{}' scheme, found '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut builder = YoloOnnxBuilder {
      model_path: url.path().to_string(),
      input_size: PREPARED_IMAGE_SIZE as usize,
      candidate_thresh: YOLO_CANDIDATE_THRESH,
      nms_iou: YOLO_NMS_IOU,
    };

    for (k, v) in url.query_pairs() {
      let invalid = || YoloOnnxError::ModelPathError(format!("invalid value for '{}': {}", k, v));
      match k.as_ref() {
        "size" => builder.input_size = v.parse().map_err(|_| invalid())?,
        "conf" => builder.candidate_thresh = v.parse().map_err(|_| invalid())?,
        "iou" => builder.nms_iou = v.parse().map_err(|_| invalid())?,
        _ => debug!("忽略未知的模型参数: {}={}", k, v),
      }
    }

    // 画布小于预处理尺寸时，letterbox 会裁掉图像的右侧和下侧
    if builder.input_size < PREPARED_IMAGE_SIZE as usize {
      return Err(YoloOnnxError::ModelPathError(format!(
        "model input size {} is smaller than the prepared image bound {}",
        builder.input_size, PREPARED_IMAGE_SIZE
      )));
    }

    Ok(builder)
  }
}

impl YoloOnnxBuilder {
  pub fn build(self) -> Result<YoloOnnx, YoloOnnxError> {
    info!("加载模型文件: {}", self.model_path);
    let metadata = std::fs::metadata(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      metadata.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()?.commit_from_file(&self.model_path)?;
    info!(
      "模型加载完成, 输入尺寸 {}x{}",
      self.input_size, self.input_size
    );

    Ok(YoloOnnx {
      session: Mutex::new(session),
      input_size: self.input_size,
      candidate_thresh: self.candidate_thresh,
      nms_iou: self.nms_iou,
    })
  }
}

impl Model for YoloOnnx {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = YoloOnnxError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    let frame = RgbNchwFrame::letterbox(input, self.input_size);
    let tensor = Tensor::from_array((frame.shape(), frame.into_data()))?;

    debug!("执行模型推理");
    let mut session = lock_session(&self.session);
    let outputs = session.run(ort::inputs![tensor])?;

    debug!("获取模型输出");
    let output = outputs
      .get("output0")
      .or_else(|| outputs.get("output"))
      .ok_or_else(|| YoloOnnxError::OutputShape("model has no 'output0' node".to_string()))?;
    let (shape, data) = output.try_extract_tensor::<f32>()?;
    let shape: Vec<usize> = shape.iter().map(|d| (*d).max(0) as usize).collect();

    let candidates = decode_predictions(
      &shape,
      data,
      self.candidate_thresh,
      input.width() as f32,
      input.height() as f32,
    )?;
    let items = non_maximum_suppression(candidates, self.nms_iou, YOLO_MAX_DETECTIONS);

    debug!("检测到 {} 个物体", items.len());
    debug!("检测结果: {:?}", items);

    Ok(DetectResult::from(items))
  }
}

/// 上一次推理在持锁时 panic 不影响会话本身，取回锁继续使用
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
  session.lock().unwrap_or_else(|poisoned| {
    warn!("推理会话锁已中毒，恢复后继续使用");
    poisoned.into_inner()
  })
}

/// 解析 YOLOv8/YOLO11 检测头输出
///
/// 输出形状为 `[1, 4 + 类别数, 候选数]`，部分导出为转置后的 `[1, 候选数, 4 + 类别数]`，
/// 通过较短的一维判断特征维。框为中心点格式，这里转换为左上右下并裁剪到图像范围内。
pub(crate) fn decode_predictions(
  shape: &[usize],
  data: &[f32],
  candidate_thresh: f32,
  image_w: f32,
  image_h: f32,
) -> Result<Vec<RawDetection>, YoloOnnxError> {
  if shape.len() != 3 || shape[0] != 1 {
    error!("模型输出形状不符合预期: {:?}", shape);
    return Err(YoloOnnxError::OutputShape(format!(
      "expected [1, features, anchors], got {:?}",
      shape
    )));
  }

  let (features, anchors, transposed) = if shape[1] <= shape[2] {
    (shape[1], shape[2], false)
  } else {
    (shape[2], shape[1], true)
  };
  if features <= YOLO_BOX_VALUES || data.len() != features * anchors {
    return Err(YoloOnnxError::OutputShape(format!(
      "output {:?} does not hold box and class scores ({} values)",
      shape,
      data.len()
    )));
  }

  let value = |feature: usize, anchor: usize| {
    if transposed {
      data[anchor * features + feature]
    } else {
      data[feature * anchors + anchor]
    }
  };

  let num_classes = features - YOLO_BOX_VALUES;
  let mut items = Vec::new();
  for anchor in 0..anchors {
    let (class_id, score) = (0..num_classes)
      .map(|c| (c, value(YOLO_BOX_VALUES + c, anchor)))
      .fold((0usize, f32::MIN), |best, cur| {
        if cur.1 > best.1 { cur } else { best }
      });

    if score < candidate_thresh {
      continue;
    }

    let cx = value(0, anchor);
    let cy = value(1, anchor);
    let w = value(2, anchor);
    let h = value(3, anchor);

    let x_min = (cx - w / 2.0).clamp(0.0, image_w);
    let y_min = (cy - h / 2.0).clamp(0.0, image_h);
    let x_max = (cx + w / 2.0).clamp(0.0, image_w);
    let y_max = (cy + h / 2.0).clamp(0.0, image_h);

    // 完全落在填充区域内的框
    if x_min >= x_max || y_min >= y_max {
      continue;
    }

    items.push(RawDetection {
      bbox: [x_min, y_min, x_max, y_max],
      class_id: class_id as u32,
      confidence: score,
    });
  }

  Ok(items)
}

#[cfg(test)]
mod tests {
  use super::*;

  // 两个候选，三个类别，按 [1, 7, 2] 排布
  fn sample() -> Vec<f32> {
    vec![
      100.0, 500.0, // cx
      50.0, 500.0, // cy
      40.0, 20.0, // w
      20.0, 20.0, // h
      0.1, 0.2, // class 0
      0.9, 0.1, // class 1
      0.3, 0.15, // class 2
    ]
  }

  #[test]
  fn decodes_feature_major_output() {
    let items = decode_predictions(&[1, 7, 2], &sample(), 0.25, 640.0, 320.0).unwrap();
    assert_eq!(
      items,
      vec![RawDetection {
        bbox: [80.0, 40.0, 120.0, 60.0],
        class_id: 1,
        confidence: 0.9,
      }]
    );
  }

  #[test]
  fn decodes_transposed_output() {
    let data = sample();
    let mut transposed = vec![0.0; data.len()];
    for f in 0..7 {
      for a in 0..2 {
        transposed[a * 7 + f] = data[f * 2 + a];
      }
    }
    let items = decode_predictions(&[1, 2, 7], &transposed, 0.25, 640.0, 320.0).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].class_id, 1);
  }

  #[test]
  fn drops_boxes_inside_padding() {
    // 第二个候选的中心在 y=500，超出 320 高的图像
    let mut data = sample();
    data[9] = 0.8;
    let items = decode_predictions(&[1, 7, 2], &data, 0.25, 640.0, 320.0).unwrap();
    assert_eq!(items.len(), 1);
  }

  #[test]
  fn rejects_bad_shape() {
    assert!(matches!(
      decode_predictions(&[1, 4, 2], &[0.0; 8], 0.25, 640.0, 640.0),
      Err(YoloOnnxError::OutputShape(_))
    ));
    assert!(matches!(
      decode_predictions(&[2, 7, 2], &[0.0; 28], 0.25, 640.0, 640.0),
      Err(YoloOnnxError::OutputShape(_))
    ));
  }

  #[test]
  fn builder_reads_query_options() {
    let url = Url::parse("onnx:///models/best.onnx?size=1280&conf=0.1&iou=0.5").unwrap();
    let builder = YoloOnnxBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/models/best.onnx");
    assert_eq!(builder.input_size, 1280);
    assert_eq!(builder.candidate_thresh, 0.1);
    assert_eq!(builder.nms_iou, 0.5);
  }

  #[test]
  fn builder_defaults_to_prepared_size() {
    let url = Url::parse("onnx:///models/best.onnx").unwrap();
    let builder = YoloOnnxBuilder::from_url(&url).unwrap();
    assert_eq!(builder.input_size, PREPARED_IMAGE_SIZE as usize);
  }

  #[test]
  fn builder_rejects_input_smaller_than_prepared_image() {
    let url = Url::parse("onnx:///models/best.onnx?size=320").unwrap();
    let err = YoloOnnxBuilder::from_url(&url).err().unwrap();
    assert!(matches!(err, YoloOnnxError::ModelPathError(_)));
    assert!(err.to_string().contains("320"));
  }

  #[test]
  fn poisoned_session_lock_is_recovered() {
    let lock = std::sync::Arc::new(Mutex::new(7u32));
    let poisoner = lock.clone();
    let _ = std::thread::spawn(move || {
      let _guard = poisoner.lock().unwrap();
      panic!("inference panicked");
    })
    .join();

    assert!(lock.is_poisoned());
    assert_eq!(*lock_session(&lock), 7);
  }

  #[test]
  fn builder_rejects_other_scheme() {
    let url = Url::parse("file:///models/car-damage.onnx").unwrap();
    assert!(matches!(
      YoloOnnxBuilder::from_url(&url),
      Err(YoloOnnxError::ModelPathError(_))
    ));
  }
}
