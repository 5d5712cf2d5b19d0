// 该文件是 Cheshang （车伤） 项目的一部分。
// src/web.rs - 网页上传与评估服务
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

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use tracing::info;

use crate::{model::Detector, pipeline::PostProcessor};

mod error;
mod handler;
mod page;

pub use self::error::AppError;
pub use self::handler::{AssessResponse, ImageInfo};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub bind: SocketAddr,
  pub inference_timeout: Duration,
  pub max_upload_bytes: usize,
}

/// 每个请求共享的只读状态，推理会话内部自行加锁
pub struct AppState {
  pub detector: Box<dyn Detector>,
  pub post: PostProcessor,
  pub inference_timeout: Duration,
}

impl AppState {
  pub fn new(detector: Box<dyn Detector>, post: PostProcessor) -> Self {
    Self {
      detector,
      post,
      inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
    }
  }

  pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
    self.inference_timeout = timeout;
    self
  }
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
  Router::new()
    .route("/", get(handler::index))
    .route("/assess", post(handler::assess_page))
    .route("/api/assess", post(handler::assess_api))
    .route("/healthz", get(handler::healthz))
    .layer(DefaultBodyLimit::max(max_upload_bytes))
    .with_state(state)
}

pub async fn serve(config: ServerConfig, state: AppState) -> std::io::Result<()> {
  let app = router(Arc::new(state), config.max_upload_bytes);
  let listener = tokio::net::TcpListener::bind(config.bind).await?;
  info!("服务已启动: http://{}", listener.local_addr()?);
  axum::serve(listener, app).await
}
