// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/server/mod.rs - HTTP 接口
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

mod error;
mod routes;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Extension, Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::pipeline::Pipeline;

pub use error::{ApiError, ErrorBody};

pub const FILE_FIELD: &str = "file";
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// 只看文件名后缀，不检查内容
pub fn is_allowed_file(filename: &str) -> bool {
  filename
    .rsplit_once('.')
    .map(|(_, extension)| extension.to_lowercase())
    .is_some_and(|extension| ALLOWED_EXTENSIONS.contains(&extension.as_str()))
}

/// 所有请求共享的状态
#[derive(Debug)]
pub struct AppState {
  pub pipeline: Pipeline,
  pub model_path: PathBuf,
  pub labels_path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
  /// `/detect` 从读取上传到返回结果的总时限
  pub request_timeout: Duration,
  pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      request_timeout: Duration::from_secs(30),
      max_upload_bytes: 10 * 1024 * 1024,
    }
  }
}

pub fn router(state: Arc<AppState>, config: ServerConfig) -> Router {
  Router::new()
    .route("/", get(routes::home))
    .route("/health", get(routes::health))
    .route("/labels", get(routes::labels))
    .route("/ui", get(routes::ui))
    .route("/detect", post(routes::detect))
    .layer(DefaultBodyLimit::max(config.max_upload_bytes))
    .layer(Extension(config))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
