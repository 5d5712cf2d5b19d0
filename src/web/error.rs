// 该文件是 Cheshang （车伤） 项目的一部分。
// src/web/error.rs - 请求错误
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

use std::time::Duration;

use axum::{
  Json,
  extract::multipart::MultipartError,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{input::ImagePrepError, task::AssessError};

#[derive(Error, Debug)]
pub enum AppError {
  #[error("{0}")]
  BadRequest(String),
  #[error("{}", multipart_message(.0))]
  Multipart(#[from] MultipartError),
  #[error(transparent)]
  Assess(#[from] AssessError),
  #[error("inference did not finish within {0:?}")]
  Timeout(Duration),
  #[error("failed to encode result image: {0}")]
  Encode(#[from] image::ImageError),
  #[error("internal error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn status_code(&self) -> StatusCode {
    match self {
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::Multipart(e) => e.status(),
      AppError::Assess(AssessError::Prepare(ImagePrepError::UnsupportedFormat(_))) => {
        StatusCode::UNSUPPORTED_MEDIA_TYPE
      }
      AppError::Assess(AssessError::Prepare(_)) => StatusCode::UNPROCESSABLE_ENTITY,
      AppError::Assess(_) | AppError::Encode(_) | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
    }
  }
}

fn multipart_message(e: &MultipartError) -> String {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    "The uploaded file is too large".to_string()
  } else {
    e.body_text()
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let body = Json(json!({ "error": self.to_string() }));
    (self.status_code(), body).into_response()
  }
}
