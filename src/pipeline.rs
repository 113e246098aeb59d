// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/pipeline.rs - 推理流水线：预处理 -> 推理 -> 分类
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

use std::{sync::Arc, time::Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  classify::{ClassifyError, DEFAULT_THRESHOLD, DetectionResult, classify},
  model::{InferError, ModelContext},
  preprocess::{PreprocessError, preprocess},
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  Preprocess(#[from] PreprocessError),
  #[error(transparent)]
  Infer(#[from] InferError),
  #[error(transparent)]
  Classify(#[from] ClassifyError),
}

impl PipelineError {
  /// 由客户端输入引起的错误（4xx），其余为服务端错误
  pub fn is_client_error(&self) -> bool {
    matches!(self, PipelineError::Preprocess(_))
  }
}

/// 共享模型上下文之上的无状态推理流水线
#[derive(Debug, Clone)]
pub struct Pipeline {
  context: Arc<ModelContext>,
  threshold: f32,
}

impl Pipeline {
  pub fn new(context: Arc<ModelContext>) -> Self {
    Self {
      context,
      threshold: DEFAULT_THRESHOLD,
    }
  }

  pub fn with_threshold(mut self, threshold: f32) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  pub fn context(&self) -> &ModelContext {
    &self.context
  }

  /// 单张图像的完整检测
  ///
  /// 每个阶段的错误立即返回，不做重试。
  pub fn detect(&self, raw: &[u8]) -> Result<DetectionResult, PipelineError> {
    let now = Instant::now();
    let tensor = preprocess(raw, self.context.input_shape())?;
    let preprocessed = now.elapsed();
    debug!("预处理完成，耗时: {:.2?}", preprocessed);

    let scores = self.context.infer(&tensor)?;
    let inferred = now.elapsed();
    debug!("推理完成，耗时: {:.2?}", inferred - preprocessed);

    let result = classify(&scores, self.context.labels(), self.threshold)?;
    info!(
      "检测完成: detected={}, label={:?}, confidence={:.4}, 总耗时: {:.2?}",
      result.detected,
      result.top_label,
      result.top_confidence,
      now.elapsed()
    );
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use std::{io::Cursor, sync::atomic::Ordering};

  use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

  use super::*;
  use crate::model::testing::{ScriptedEngine, labels};

  fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([30, 140, 60]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
      .write_to(&mut bytes, ImageFormat::Png)
      .unwrap();
    bytes.into_inner()
  }

  fn pipeline(scores: Vec<f32>, names: &[&str]) -> (Pipeline, Arc<std::sync::atomic::AtomicUsize>) {
    let engine = ScriptedEngine::new(16, 24, scores);
    let calls = engine.calls.clone();
    let context = ModelContext::with_engine(Box::new(engine), labels(names));
    (Pipeline::new(Arc::new(context)), calls)
  }

  #[test]
  fn detects_from_raw_bytes() {
    let (pipeline, calls) = pipeline(
      vec![0.1, 0.85, 0.05],
      &["Early_Blight", "Late_Blight", "Healthy"],
    );
    let result = pipeline.detect(&png(300, 200)).unwrap();

    assert!(result.detected);
    assert_eq!(result.top_label.as_deref(), Some("Late_Blight"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn corrupt_image_never_reaches_the_model() {
    let (pipeline, calls) = pipeline(vec![0.9, 0.1], &["A", "B"]);
    let err = pipeline.detect(b"\x89PNG\r\n\x1a\nbroken").unwrap_err();

    assert!(matches!(err, PipelineError::Preprocess(_)));
    assert!(err.is_client_error());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn label_mismatch_is_a_server_error() {
    let (pipeline, _) = pipeline(vec![0.05, 0.1, 0.85], &["Early_Blight", "Late_Blight"]);
    let err = pipeline.detect(&png(10, 10)).unwrap_err();

    assert!(matches!(
      err,
      PipelineError::Classify(ClassifyError::LabelIndexError { index: 2, .. })
    ));
    assert!(!err.is_client_error());
  }

  #[test]
  fn custom_threshold() {
    let (pipeline, _) = pipeline(vec![0.3, 0.3, 0.4], &["A", "B", "C"]);
    assert!(!pipeline.detect(&png(8, 8)).unwrap().detected);

    let pipeline = pipeline.with_threshold(0.35);
    assert_eq!(pipeline.threshold(), 0.35);
    assert!(pipeline.detect(&png(8, 8)).unwrap().detected);
  }
}
