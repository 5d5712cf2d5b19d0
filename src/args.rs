// 该文件是 Cheshang （车伤） 项目的一部分。
// src/args.rs - 服务参数配置
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

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use url::Url;

use cheshang::web::{DEFAULT_INFERENCE_TIMEOUT, DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};

/// Cheshang 车辆损伤评估服务
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型地址，例如 onnx:///models/car-damage.onnx?size=640
  #[arg(long, env = "CHESHANG_MODEL", value_name = "MODEL")]
  pub model: Url,

  /// 监听地址
  #[arg(long, env = "CHESHANG_BIND", default_value = "127.0.0.1:8080", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 标注文字使用的字体文件，不指定时尝试系统字体
  #[arg(long, env = "CHESHANG_FONT", value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 单次推理超时（秒）
  #[arg(
    long,
    env = "CHESHANG_INFERENCE_TIMEOUT_SECS",
    default_value_t = DEFAULT_INFERENCE_TIMEOUT.as_secs(),
    value_name = "SECS"
  )]
  pub inference_timeout_secs: u64,

  /// 上传大小上限（MiB）
  #[arg(
    long,
    env = "CHESHANG_MAX_UPLOAD_MB",
    default_value_t = DEFAULT_MAX_UPLOAD_BYTES / (1024 * 1024),
    value_name = "MIB"
  )]
  pub max_upload_mb: usize,
}

impl Args {
  pub fn server_config(&self) -> ServerConfig {
    ServerConfig {
      bind: self.bind,
      inference_timeout: Duration::from_secs(self.inference_timeout_secs),
      max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
    }
  }
}
