// 该文件是 Cheshang （车伤） 项目的一部分。
// src/task.rs - 单次评估任务
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

use std::time::{Duration, Instant};

use image::RgbImage;
use thiserror::Error;
use tracing::info;

use crate::{
  input::{ImagePrepError, prepare_image},
  model::{Detector, LabelMappingError, ModelInferenceError},
  output::Render,
  pipeline::{PipelineOutput, PostProcessor},
};

#[derive(Error, Debug)]
pub enum AssessError {
  #[error("{0}")]
  Prepare(#[from] ImagePrepError),
  #[error("{0}")]
  Inference(#[from] ModelInferenceError),
  #[error("{0}")]
  LabelMapping(#[from] LabelMappingError),
}

/// 一次请求的完整结果，请求结束后即丢弃
#[derive(Debug, Clone)]
pub struct Assessment {
  pub prepared: RgbImage,
  pub output: PipelineOutput,
  pub elapsed: Duration,
}

/// 对上传的字节流做完整评估：预处理、推理、后处理
pub fn assess<D: Detector + ?Sized>(
  detector: &D,
  post: &PostProcessor,
  bytes: &[u8],
) -> Result<Assessment, AssessError> {
  let now = Instant::now();
  let prepared = prepare_image(bytes)?;
  assess_prepared(detector, post, prepared, now)
}

fn assess_prepared<D: Detector + ?Sized>(
  detector: &D,
  post: &PostProcessor,
  prepared: RgbImage,
  started: Instant,
) -> Result<Assessment, AssessError> {
  info!(
    "图像预处理完成: {}x{}，开始推理...",
    prepared.width(),
    prepared.height()
  );
  let raw = detector.detect(&prepared)?;
  info!(
    "推理完成，耗时: {:.2?}，原始检测 {} 个",
    started.elapsed(),
    raw.len()
  );

  let output = post.process(&prepared, &raw)?;
  let elapsed = started.elapsed();
  info!(
    "后处理完成，保留 {} 个检测，总耗时: {:.2?}",
    output.detections.len(),
    elapsed
  );

  Ok(Assessment {
    prepared,
    output,
    elapsed,
  })
}

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: &M, output: &O) -> Result<Self::Output, Self::Error>;
}

/// 从输入取一张图像，评估后交给输出渲染
pub struct OneShotTask {
  post: PostProcessor,
}

impl OneShotTask {
  pub fn new(post: PostProcessor) -> Self {
    Self { post }
  }
}

impl<I, M, O> Task<I, M, O> for OneShotTask
where
  I: Iterator<Item = RgbImage>,
  M: Detector,
  O: Render<RgbImage, PipelineOutput>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = Assessment;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: &M, output: &O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    let assessment = assess_prepared(model, &self.post, frame, Instant::now())?;
    output.render_result(&assessment.prepared, &assessment.output)?;
    info!("渲染完成");
    Ok(assessment)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::{DetectResult, RawDetection},
    output::draw::Draw,
    pipeline::SeverityTier,
  };
  use image::{DynamicImage, ImageFormat, Rgb};
  use std::{cell::RefCell, convert::Infallible, io::Cursor};

  struct FixedDetector(Vec<RawDetection>);

  impl Detector for FixedDetector {
    fn detect(&self, _image: &RgbImage) -> Result<DetectResult, ModelInferenceError> {
      Ok(DetectResult::from(self.0.clone()))
    }
  }

  struct FailingDetector;

  impl Detector for FailingDetector {
    fn detect(&self, _image: &RgbImage) -> Result<DetectResult, ModelInferenceError> {
      Err(ModelInferenceError("backend exploded".into()))
    }
  }

  #[derive(Default)]
  struct Capture(RefCell<Option<usize>>);

  impl Render<RgbImage, PipelineOutput> for Capture {
    type Error = Infallible;

    fn render_result(&self, _frame: &RgbImage, result: &PipelineOutput) -> Result<(), Infallible> {
      *self.0.borrow_mut() = Some(result.detections.len());
      Ok(())
    }
  }

  fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
      .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
      .unwrap();
    bytes
  }

  fn detection(class_id: u32, confidence: f32) -> RawDetection {
    RawDetection {
      bbox: [5.0, 5.0, 100.0, 100.0],
      class_id,
      confidence,
    }
  }

  fn post() -> PostProcessor {
    PostProcessor::new(Draw::with_font(None))
  }

  #[test]
  fn assess_runs_full_pipeline() {
    let detector = FixedDetector(vec![detection(2, 0.8), detection(5, 0.7)]);
    let assessment = assess(&detector, &post(), &png(1000, 500)).unwrap();

    assert_eq!(assessment.prepared.dimensions(), (640, 320));
    assert_eq!(assessment.output.annotated.dimensions(), (640, 320));
    assert_eq!(assessment.output.detections.len(), 2);
    assert_eq!(
      assessment.output.severity.unwrap().tier,
      SeverityTier::Medium
    );
  }

  #[test]
  fn decode_error_short_circuits() {
    let detector = FixedDetector(vec![detection(0, 0.9)]);
    assert!(matches!(
      assess(&detector, &post(), b"not an image"),
      Err(AssessError::Prepare(_))
    ));
  }

  #[test]
  fn inference_error_is_propagated() {
    let err = assess(&FailingDetector, &post(), &png(64, 64)).unwrap_err();
    assert!(matches!(err, AssessError::Inference(_)));
    assert_eq!(err.to_string(), "model inference failed: backend exploded");
  }

  #[test]
  fn label_mismatch_yields_no_partial_result() {
    let detector = FixedDetector(vec![detection(0, 0.9), detection(42, 0.9)]);
    assert!(matches!(
      assess(&detector, &post(), &png(64, 64)),
      Err(AssessError::LabelMapping(LabelMappingError { index: 42, .. }))
    ));
  }

  #[test]
  fn one_shot_task_renders_once() {
    let detector = FixedDetector(vec![detection(1, 0.95)]);
    let capture = Capture::default();
    let input = vec![RgbImage::new(640, 640)].into_iter();

    let assessment = OneShotTask::new(post())
      .run_task(input, &detector, &capture)
      .unwrap();

    assert_eq!(*capture.0.borrow(), Some(1));
    assert_eq!(assessment.output.detections[0].confidence, 0.95);
  }

  #[test]
  fn one_shot_task_requires_input() {
    let detector = FixedDetector(vec![]);
    let input = Vec::<RgbImage>::new().into_iter();
    assert!(
      OneShotTask::new(post())
        .run_task(input, &detector, &Capture::default())
        .is_err()
    );
  }
}
