// 该文件是 Cheshang （车伤） 项目的一部分。
// src/main.rs - 服务主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cheshang::{
  FromUrl,
  model::YoloOnnxBuilder,
  output::draw::Draw,
  pipeline::PostProcessor,
  web::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();
  let config = args.server_config();

  info!("模型文件路径: {}", args.model);
  info!("监听地址: {}", config.bind);
  info!("推理超时: {:?}", config.inference_timeout);
  info!("上传大小上限: {} 字节", config.max_upload_bytes);

  let model = YoloOnnxBuilder::from_url(&args.model)?.build()?;
  let draw = match args.font.as_deref() {
    Some(path) => {
      info!("使用字体文件: {}", path.display());
      Draw::with_font_file(path)?
    }
    None => Draw::default(),
  };

  let state = AppState::new(Box::new(model), PostProcessor::new(draw))
    .with_inference_timeout(config.inference_timeout);
  web::serve(config, state).await?;

  Ok(())
}
