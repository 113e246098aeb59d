// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/server/error.rs - HTTP 错误响应
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
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::pipeline::PipelineError;

use super::ALLOWED_EXTENSIONS;

/// 统一的错误响应体：`error` 为错误类别，`message` 为可读说明
#[derive(Debug, Serialize)]
pub struct ErrorBody {
  pub error: &'static str,
  pub message: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
  #[error("no file field in request")]
  NoFile,
  #[error("empty file name")]
  NoFileSelected,
  #[error("file type not allowed: {0:?}")]
  InvalidFileType(String),
  #[error("invalid upload: {1}")]
  InvalidUpload(StatusCode, String),
  #[error("preprocessing failed: {0}")]
  Preprocessing(String),
  #[error("prediction failed: {0}")]
  Prediction(String),
  #[error("request timed out after {0:?}")]
  Timeout(Duration),
  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NoFile
      | ApiError::NoFileSelected
      | ApiError::InvalidFileType(_)
      | ApiError::Preprocessing(_) => StatusCode::BAD_REQUEST,
      ApiError::InvalidUpload(status, _) => *status,
      ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
      ApiError::Prediction(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn body(&self) -> ErrorBody {
    match self {
      ApiError::NoFile => ErrorBody {
        error: "No file provided",
        message: "Please upload an image file with key \"file\"".to_string(),
      },
      ApiError::NoFileSelected => ErrorBody {
        error: "No file selected",
        message: "Please select a file to upload".to_string(),
      },
      ApiError::InvalidFileType(_) => ErrorBody {
        error: "Invalid file type",
        message: format!("Allowed file types: {}", ALLOWED_EXTENSIONS.join(", ")),
      },
      ApiError::InvalidUpload(_, msg) => ErrorBody {
        error: "Invalid upload",
        message: msg.clone(),
      },
      ApiError::Preprocessing(msg) => ErrorBody {
        error: "Image preprocessing failed",
        message: msg.clone(),
      },
      ApiError::Prediction(msg) => ErrorBody {
        error: "Prediction failed",
        message: msg.clone(),
      },
      ApiError::Timeout(limit) => ErrorBody {
        error: "Request timeout",
        message: format!("Detection did not finish within {:.1}s", limit.as_secs_f64()),
      },
      ApiError::Internal(msg) => ErrorBody {
        error: "Internal server error",
        message: msg.clone(),
      },
    }
  }
}

impl From<PipelineError> for ApiError {
  fn from(err: PipelineError) -> Self {
    if err.is_client_error() {
      warn!("图像预处理失败: {}", err);
      ApiError::Preprocessing(err.to_string())
    } else {
      error!("推理失败: {}", err);
      ApiError::Prediction(err.to_string())
    }
  }
}

impl From<MultipartError> for ApiError {
  fn from(err: MultipartError) -> Self {
    warn!("读取上传内容失败: {}", err.body_text());
    ApiError::InvalidUpload(err.status(), err.body_text())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status(), Json(self.body())).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{classify::ClassifyError, preprocess::PreprocessError};

  #[test]
  fn client_errors_are_bad_requests() {
    for err in [
      ApiError::NoFile,
      ApiError::NoFileSelected,
      ApiError::InvalidFileType("tiff".to_string()),
    ] {
      assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
  }

  #[test]
  fn maps_pipeline_errors_by_stage() {
    let preprocess = PipelineError::from(PreprocessError::PreprocessingError("bad".to_string()));
    let api = ApiError::from(preprocess);
    assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    assert_eq!(api.body().error, "Image preprocessing failed");

    let classify = PipelineError::from(ClassifyError::LabelIndexError {
      index: 2,
      labels: 2,
    });
    let api = ApiError::from(classify);
    assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(api.body().error, "Prediction failed");
  }

  #[test]
  fn timeout_has_structured_body() {
    let err = ApiError::Timeout(Duration::from_secs(30));
    assert_eq!(err.status(), StatusCode::REQUEST_TIMEOUT);
    let body = err.body();
    assert_eq!(body.error, "Request timeout");
    assert_eq!(body.message, "Detection did not finish within 30.0s");
  }

  #[test]
  fn invalid_type_lists_allowed_extensions() {
    let body = ApiError::InvalidFileType("txt".to_string()).body();
    assert_eq!(
      body.message,
      "Allowed file types: png, jpg, jpeg, gif, bmp, webp"
    );
  }
}
