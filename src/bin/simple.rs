// 该文件是 Cheshang （车伤） 项目的一部分。
// src/bin/simple.rs - 单张图像评估
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use url::Url;

use cheshang::{
  FromUrl,
  input::ImageFileInput,
  model::YoloOnnxBuilder,
  output::{Render, SaveImageFileOutput, draw::Draw, summary::LogSummaryOutput},
  pipeline::PostProcessor,
  task::{OneShotTask, Task},
};
use tracing::info;

/// 对单张图像做损伤评估
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型地址
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///tmp/car.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///tmp/car-annotated.png?record
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 标注字体文件
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = ImageFileInput::from_url(&args.input)?;
  let model = YoloOnnxBuilder::from_url(&args.model)?.build()?;
  let output = SaveImageFileOutput::from_url(&args.output)?;
  let draw = match args.font.as_deref() {
    Some(path) => Draw::with_font_file(path)?,
    None => Draw::default(),
  };

  let assessment = OneShotTask::new(PostProcessor::new(draw)).run_task(input, &model, &output)?;
  info!("评估完成，耗时: {:.2?}", assessment.elapsed);
  LogSummaryOutput.render_result(&assessment.prepared, &assessment.output)?;

  Ok(())
}
