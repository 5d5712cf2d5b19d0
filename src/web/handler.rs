// 该文件是 Cheshang （车伤） 项目的一部分。
// src/web/handler.rs - 请求处理
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

use std::sync::Arc;

use axum::{
  Json,
  extract::{Multipart, State},
  response::{Html, IntoResponse, Response},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  pipeline::{LabeledDetection, SeverityAssessment},
  task::{Assessment, assess},
  web::{AppError, AppState, page},
};

/// 上传表单中图像字段的名称
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct AssessResponse {
  pub detections: Vec<LabeledDetection>,
  pub severity: Option<SeverityAssessment>,
  pub image: ImageInfo,
  pub elapsed_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct ImageInfo {
  pub width: u32,
  pub height: u32,
}

impl From<Assessment> for AssessResponse {
  fn from(assessment: Assessment) -> Self {
    AssessResponse {
      image: ImageInfo {
        width: assessment.prepared.width(),
        height: assessment.prepared.height(),
      },
      elapsed_ms: assessment.elapsed.as_secs_f64() * 1000.0,
      detections: assessment.output.detections,
      severity: assessment.output.severity,
    }
  }
}

pub async fn index() -> Html<String> {
  Html(page::index_page())
}

pub async fn healthz() -> &'static str {
  "ok"
}

/// POST /assess - 返回渲染好的结果页面
pub async fn assess_page(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
  let rendered = match run_assessment(state, multipart).await {
    Ok(assessment) => page::result_page(&assessment).map_err(AppError::from),
    Err(e) => Err(e),
  };

  match rendered {
    Ok(html) => Html(html).into_response(),
    Err(e) => {
      warn!("评估失败: {}", e);
      (e.status_code(), Html(page::error_page(&e.to_string()))).into_response()
    }
  }
}

/// POST /api/assess - 返回 JSON
pub async fn assess_api(
  State(state): State<Arc<AppState>>,
  multipart: Multipart,
) -> Result<Json<AssessResponse>, AppError> {
  let assessment = run_assessment(state, multipart).await.inspect_err(|e| {
    warn!("评估失败: {}", e);
  })?;
  Ok(Json(AssessResponse::from(assessment)))
}

async fn run_assessment(
  state: Arc<AppState>,
  mut multipart: Multipart,
) -> Result<Assessment, AppError> {
  let bytes = read_image_field(&mut multipart).await?;
  info!("收到上传图像: {} 字节", bytes.len());

  // 推理是阻塞调用，放到阻塞线程池并加超时
  // 超时后阻塞任务仍会跑完，但结果被丢弃
  let timeout = state.inference_timeout;
  let task = tokio::task::spawn_blocking(move || {
    assess(state.detector.as_ref(), &state.post, &bytes)
  });
  let joined = tokio::time::timeout(timeout, task).await.map_err(|_| {
    warn!("推理超过 {:?} 未完成，结果将被丢弃，后台任务仍占用推理会话", timeout);
    AppError::Timeout(timeout)
  })?;
  let assessment = joined.map_err(|e| AppError::Internal(e.to_string()))??;

  Ok(assessment)
}

async fn read_image_field(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
  // 超过上传上限时 MultipartError 携带 413
  while let Some(field) = multipart.next_field().await? {
    if field.name() == Some(IMAGE_FIELD) {
      let data = field.bytes().await?;
      if data.is_empty() {
        return Err(AppError::BadRequest("The uploaded file is empty".to_string()));
      }
      return Ok(data.to_vec());
    }
  }

  Err(AppError::BadRequest(format!(
    "No '{}' field in request",
    IMAGE_FIELD
  )))
}
