// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/server/routes.rs - HTTP 路由处理
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
  Extension, Json,
  extract::{Multipart, State, multipart::MultipartRejection},
  response::Html,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::output::DetectResponse;

use super::{
  ALLOWED_EXTENSIONS, AppState, FILE_FIELD, ServerConfig, error::ApiError, is_allowed_file,
};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// `POST /detect`
pub async fn detect(
  State(state): State<Arc<AppState>>,
  Extension(config): Extension<ServerConfig>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
  tokio::time::timeout(config.request_timeout, receive_and_detect(state, multipart))
    .await
    .map_err(|_| {
      warn!("检测请求超时: {:?}", config.request_timeout);
      ApiError::Timeout(config.request_timeout)
    })?
}

async fn receive_and_detect(
  state: Arc<AppState>,
  multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
  let mut multipart = multipart.map_err(|rejection| {
    debug!("请求不是 multipart 表单: {}", rejection);
    ApiError::NoFile
  })?;

  let mut upload = None;
  while let Some(field) = multipart.next_field().await? {
    if field.name() != Some(FILE_FIELD) {
      continue;
    }

    // 没有 filename 的同名字段是普通表单值，不算上传文件
    let Some(filename) = field.file_name().map(str::to_string) else {
      debug!("字段 {} 不是文件", FILE_FIELD);
      continue;
    };
    if filename.is_empty() {
      return Err(ApiError::NoFileSelected);
    }
    if !is_allowed_file(&filename) {
      return Err(ApiError::InvalidFileType(filename));
    }

    let data = field.bytes().await?;
    upload = Some((filename, data));
    break;
  }

  let (filename, data) = upload.ok_or(ApiError::NoFile)?;
  info!("收到检测请求: {} ({} 字节)", filename, data.len());

  let pipeline = state.pipeline.clone();
  let result = tokio::task::spawn_blocking(move || pipeline.detect(&data))
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

  Ok(Json(DetectResponse::from(&result)))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
  pub status: &'static str,
  pub message: &'static str,
  pub model_loaded: bool,
  pub labels_loaded: bool,
}

/// `GET /health`，只检查模型与标签文件是否存在
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "healthy",
    message: "Potato disease detection API is running",
    model_loaded: state.model_path.exists(),
    labels_loaded: state.labels_path.exists(),
  })
}

/// `GET /`
pub async fn home() -> Json<Value> {
  Json(json!({
    "message": "Potato Disease Detection API",
    "version": env!("CARGO_PKG_VERSION"),
    "endpoints": {
      "/detect": "POST - Upload image for disease detection",
      "/health": "GET - Health check",
      "/labels": "GET - Detectable disease classes",
      "/ui": "GET - Interactive detection page",
      "/": "GET - API information"
    },
    "usage": {
      "endpoint": "/detect",
      "method": "POST",
      "content_type": "multipart/form-data",
      "file_key": FILE_FIELD,
      "supported_formats": ALLOWED_EXTENSIONS
    }
  }))
}

/// `GET /labels`
pub async fn labels(State(state): State<Arc<AppState>>) -> Json<Value> {
  Json(json!({ "labels": state.pipeline.context().labels() }))
}

/// `GET /ui`
pub async fn ui() -> Html<&'static str> {
  Html(INDEX_HTML)
}
