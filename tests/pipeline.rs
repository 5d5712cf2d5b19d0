// 该文件是 Cheshang （车伤） 项目的一部分。
// tests/pipeline.rs - 评估流程集成测试
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

use std::{convert::Infallible, io::Cursor};

use cheshang::{
  FromUrl,
  model::{DamageLabel, DetectResult, Model, RawDetection},
  output::{Render, SaveImageFileOutput, draw::Draw, summary::LogSummaryOutput},
  pipeline::{PostProcessor, SeverityTier},
  task::{AssessError, OneShotTask, Task, assess},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use url::Url;

/// 返回固定检测结果的模型，框坐标按输入图像尺寸缩放
struct FakeModel {
  detections: Vec<(u32, f32)>,
}

impl Model for FakeModel {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = Infallible;

  fn infer(&self, input: &RgbImage) -> Result<DetectResult, Infallible> {
    let (w, h) = (input.width() as f32, input.height() as f32);
    Ok(DetectResult::from(
      self
        .detections
        .iter()
        .enumerate()
        .map(|(i, &(class_id, confidence))| {
          let offset = i as f32 * 10.0;
          RawDetection {
            bbox: [offset, offset, w / 2.0 + offset, h / 2.0 + offset],
            class_id,
            confidence,
          }
        })
        .collect::<Vec<_>>(),
    ))
  }
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([120, 130, 140]));
  let mut bytes = Vec::new();
  DynamicImage::ImageRgb8(image)
    .write_to(&mut Cursor::new(&mut bytes), format)
    .unwrap();
  bytes
}

fn post() -> PostProcessor {
  PostProcessor::new(Draw::with_font(None))
}

#[test]
fn four_candidates_keep_three_in_order() {
  let model = FakeModel {
    detections: vec![(0, 0.95), (1, 0.10), (2, 0.45), (16, 0.60)],
  };
  let assessment = assess(&model, &post(), &encode(1200, 800, ImageFormat::Jpeg)).unwrap();

  assert_eq!(assessment.prepared.dimensions(), (640, 426));
  let labels: Vec<_> = assessment
    .output
    .detections
    .iter()
    .map(|d| d.label)
    .collect();
  assert_eq!(
    labels,
    vec![
      DamageLabel::BodypanelDent,
      DamageLabel::HeadlightDamage,
      DamageLabel::RoofDent
    ]
  );

  let severity = assessment.output.severity.unwrap();
  assert_eq!(severity.count, 3);
  assert_eq!(severity.tier, SeverityTier::High);
  assert!((severity.mean_confidence - 2.0 / 3.0).abs() < 1e-4);
}

#[test]
fn annotation_leaves_prepared_image_untouched() {
  let model = FakeModel {
    detections: vec![(3, 0.9)],
  };
  let assessment = assess(&model, &post(), &encode(640, 640, ImageFormat::Png)).unwrap();

  assert!(
    assessment
      .prepared
      .pixels()
      .all(|p| *p == Rgb([120, 130, 140]))
  );
  assert_ne!(assessment.prepared, assessment.output.annotated);
}

#[test]
fn nothing_above_threshold_means_no_severity() {
  let model = FakeModel {
    detections: vec![(0, 0.30), (1, 0.05)],
  };
  let assessment = assess(&model, &post(), &encode(320, 200, ImageFormat::Png)).unwrap();

  assert!(assessment.output.detections.is_empty());
  assert!(assessment.output.severity.is_none());
  assert_eq!(assessment.prepared, assessment.output.annotated);
}

#[test]
fn unknown_class_fails_the_request() {
  let model = FakeModel {
    detections: vec![(4, 0.8), (17, 0.8)],
  };
  let err = assess(&model, &post(), &encode(64, 64, ImageFormat::Png)).unwrap_err();
  assert!(matches!(err, AssessError::LabelMapping(_)));
}

#[test]
fn one_shot_task_writes_image_and_record() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("out").join("annotated.png");
  let url = Url::parse(&format!("image://{}?record", path.display())).unwrap();
  let output = SaveImageFileOutput::from_url(&url).unwrap();

  let model = FakeModel {
    detections: vec![(11, 0.72)],
  };
  let input = vec![RgbImage::from_pixel(640, 480, Rgb([0, 0, 0]))].into_iter();
  let assessment = OneShotTask::new(post())
    .run_task(input, &model, &output)
    .unwrap();
  LogSummaryOutput
    .render_result(&assessment.prepared, &assessment.output)
    .unwrap();

  let saved = image::open(&path).unwrap();
  assert_eq!((saved.width(), saved.height()), (640, 480));
  let record = std::fs::read_to_string(path.with_extension("txt")).unwrap();
  assert!(record.starts_with("fender-dent, 0.72"));
}
