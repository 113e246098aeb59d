// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/model.rs - 模型上下文
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

#[cfg(feature = "tflite")]
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::tensor::{InputShape, NormalizedTensor, ScoreVector};

mod labels;
#[cfg(feature = "tflite")]
mod tflite;

pub use self::labels::{LabelsLoadError, load_labels, parse_labels};
#[cfg(feature = "tflite")]
pub use self::tflite::TfliteEngine;

/// 加载时解析出的张量元数据
///
/// 模型只有一个输入，推理时按位置绑定，因此只记录输出所在位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorSpec {
  pub height: usize,
  pub width: usize,
  pub channels: usize,
  pub output_slot: usize,
  pub output_len: usize,
}

impl TensorSpec {
  pub fn input_shape(&self) -> InputShape {
    InputShape::new(self.height, self.width, self.channels)
  }
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("模型文件读取错误 {path}: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("推理运行时错误: {0}")]
  Runtime(String),
  #[error(transparent)]
  Labels(#[from] LabelsLoadError),
}

#[derive(Error, Debug)]
pub enum InferError {
  #[error("Input tensor shape {actual:?} does not match model input {expected:?}")]
  TensorShapeError {
    expected: [usize; 4],
    actual: [usize; 4],
  },
  #[error("Model returned {actual} scores, expected {expected}")]
  OutputLength { expected: usize, actual: usize },
  #[error("Error during prediction: {0}")]
  Runtime(String),
}

/// 推理运行时抽象
///
/// `run` 需要 `&mut self`：一次 绑定输入 -> 执行 -> 读取输出 是临界区。
pub trait Engine: Send {
  fn spec(&self) -> TensorSpec;

  fn run(&mut self, input: &NormalizedTensor) -> Result<ScoreVector, InferError>;
}

/// 已加载的模型、输入输出形状与标签
///
/// 进程启动时创建一次，之后通过 `Arc` 共享；运行时状态由互斥锁保护。
pub struct ModelContext {
  spec: TensorSpec,
  labels: Vec<String>,
  engine: Mutex<Box<dyn Engine>>,
}

impl std::fmt::Debug for ModelContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModelContext")
      .field("spec", &self.spec)
      .field("labels", &self.labels)
      .finish_non_exhaustive()
  }
}

impl ModelContext {
  /// 从 TFLite 模型与标签文件加载
  #[cfg(feature = "tflite")]
  pub fn load(
    model_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
  ) -> Result<Self, ModelLoadError> {
    let engine = TfliteEngine::load(model_path)?;
    let labels = load_labels(labels_path)?;
    Ok(Self::with_engine(Box::new(engine), labels))
  }

  pub fn with_engine(engine: Box<dyn Engine>, labels: Vec<String>) -> Self {
    let spec = engine.spec();
    info!(
      "模型上下文就绪: 输入 {}, 输出长度 {}, 标签数量 {}",
      spec.input_shape(),
      spec.output_len,
      labels.len()
    );
    if spec.output_len != labels.len() {
      warn!(
        "模型输出长度 {} 与标签数量 {} 不一致，请检查部署文件",
        spec.output_len,
        labels.len()
      );
    }

    Self {
      spec,
      labels,
      engine: Mutex::new(engine),
    }
  }

  pub fn spec(&self) -> TensorSpec {
    self.spec
  }

  pub fn input_shape(&self) -> InputShape {
    self.spec.input_shape()
  }

  pub fn output_len(&self) -> usize {
    self.spec.output_len
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  /// 执行一次前向推理
  pub fn infer(&self, input: &NormalizedTensor) -> Result<ScoreVector, InferError> {
    let expected = self.spec.input_shape().batched();
    if input.shape() != expected {
      return Err(InferError::TensorShapeError {
        expected,
        actual: input.shape(),
      });
    }

    let scores = {
      let mut engine = self
        .engine
        .lock()
        .map_err(|_| InferError::Runtime("inference engine lock poisoned".to_string()))?;
      engine.run(input)?
    };

    if scores.len() != self.spec.output_len {
      return Err(InferError::OutputLength {
        expected: self.spec.output_len,
        actual: scores.len(),
      });
    }

    debug!("模型输出: {:?}", scores);
    Ok(scores)
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;

  /// 返回固定分数的假运行时，并记录调用次数
  pub struct ScriptedEngine {
    pub spec: TensorSpec,
    pub scores: ScoreVector,
    pub calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
  }

  impl ScriptedEngine {
    pub fn new(height: usize, width: usize, scores: Vec<f32>) -> Self {
      Self {
        spec: TensorSpec {
          height,
          width,
          channels: 3,
          output_slot: 0,
          output_len: scores.len(),
        },
        scores,
        calls: Default::default(),
      }
    }
  }

  impl Engine for ScriptedEngine {
    fn spec(&self) -> TensorSpec {
      self.spec
    }

    fn run(&mut self, _input: &NormalizedTensor) -> Result<ScoreVector, InferError> {
      self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
      Ok(self.scores.clone())
    }
  }

  pub fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::Ordering;

  use super::testing::*;
  use super::*;

  fn tensor(height: usize, width: usize, value: f32) -> NormalizedTensor {
    let shape = InputShape::new(height, width, 3);
    NormalizedTensor::from_nhwc(shape, vec![value; shape.element_count()]).unwrap()
  }

  #[test]
  fn exposes_shape_metadata() {
    let engine = ScriptedEngine::new(224, 160, vec![0.2, 0.8]);
    let context = ModelContext::with_engine(Box::new(engine), labels(&["A", "B"]));

    assert_eq!(context.input_shape(), InputShape::new(224, 160, 3));
    assert_eq!(context.output_len(), 2);
    assert_eq!(context.labels(), ["A", "B"]);
  }

  #[test]
  fn rejects_wrong_shape_before_running() {
    let engine = ScriptedEngine::new(4, 4, vec![0.5, 0.5]);
    let calls = engine.calls.clone();
    let context = ModelContext::with_engine(Box::new(engine), labels(&["A", "B"]));

    let err = context.infer(&tensor(4, 5, 0.1)).unwrap_err();
    assert!(matches!(
      err,
      InferError::TensorShapeError {
        expected: [1, 4, 4, 3],
        actual: [1, 4, 5, 3]
      }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn infer_is_idempotent() {
    let engine = ScriptedEngine::new(2, 2, vec![0.1, 0.85, 0.05]);
    let context = ModelContext::with_engine(Box::new(engine), labels(&["A", "B", "C"]));
    let input = tensor(2, 2, 0.4);

    let first = context.infer(&input).unwrap();
    let second = context.infer(&input).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, vec![0.1, 0.85, 0.05]);
  }

  struct ShortEngine;

  impl Engine for ShortEngine {
    fn spec(&self) -> TensorSpec {
      TensorSpec {
        height: 1,
        width: 1,
        channels: 3,
        output_slot: 0,
        output_len: 3,
      }
    }

    fn run(&mut self, _input: &NormalizedTensor) -> Result<ScoreVector, InferError> {
      Ok(vec![1.0])
    }
  }

  #[test]
  fn rejects_short_output() {
    let context = ModelContext::with_engine(Box::new(ShortEngine), labels(&["A", "B", "C"]));
    assert!(matches!(
      context.infer(&tensor(1, 1, 0.0)),
      Err(InferError::OutputLength {
        expected: 3,
        actual: 1
      })
    ));
  }
}
