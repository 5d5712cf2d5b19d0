// 该文件是 Cheshang （车伤） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像
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

use image::RgbImage;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, draw::Record},
  pipeline::PipelineOutput,
};

pub struct SaveImageFileOutput {
  path: String,
  record: Option<Record>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    // ?record 或 ?record=name 记录类别名，?record=id 记录类别编号
    let record = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| Record {
        label_with_name: v != "id",
      });

    Ok(SaveImageFileOutput {
      path: uri.path().to_string(),
      record,
    })
  }
}

impl SaveImageFileOutput {
  fn save_image(&self, image: &RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = Path::new(&self.path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    image
      .save(&self.path)
      .map_err(SaveImageFileError::ImageError)?;

    warn!("保存图像到文件: {}", self.path);

    Ok(())
  }
}

impl Render<RgbImage, PipelineOutput> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, _frame: &RgbImage, result: &PipelineOutput) -> Result<(), Self::Error> {
    self.save_image(&result.annotated)?;
    if let Some(record) = self.record.as_ref() {
      record
        .record(&result.detections, Path::new(&self.path))
        .map_err(SaveImageFileError::IoError)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::DamageLabel,
    pipeline::{LabeledDetection, assess_severity},
  };
  use image::Rgb;

  fn output_url(path: &Path, query: &str) -> Url {
    Url::parse(&format!("image://{}{}", path.display(), query)).unwrap()
  }

  fn pipeline_output() -> PipelineOutput {
    let detections = vec![LabeledDetection {
      bbox: [1.0, 2.0, 3.0, 4.0],
      class_id: 11,
      label: DamageLabel::FenderDent,
      confidence: 0.72,
    }];
    PipelineOutput {
      annotated: RgbImage::from_pixel(8, 4, Rgb([9, 9, 9])),
      severity: assess_severity(&detections),
      detections,
    }
  }

  #[test]
  fn saves_annotated_image_into_new_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("result.png");
    let output = SaveImageFileOutput::from_url(&output_url(&path, "")).unwrap();

    output
      .render_result(&RgbImage::new(8, 4), &pipeline_output())
      .unwrap();

    let saved = image::open(&path).unwrap().into_rgb8();
    assert_eq!(saved.dimensions(), (8, 4));
    assert!(!path.with_extension("txt").exists());
  }

  #[test]
  fn writes_record_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("result.png");
    let output = SaveImageFileOutput::from_url(&output_url(&path, "?record=id")).unwrap();

    output
      .render_result(&RgbImage::new(8, 4), &pipeline_output())
      .unwrap();

    let record = std::fs::read_to_string(path.with_extension("txt")).unwrap();
    assert_eq!(record, "11, 0.72, 1.0, 2.0, 3.0, 4.0");
  }

  #[test]
  fn rejects_other_scheme() {
    let url = Url::parse("folder:///tmp/out").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }
}
