// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/model/tflite.rs - 基于 tract 的 TFLite 推理运行时
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

use std::path::Path;

use tract_core::prelude::*;
use tracing::{debug, error, info};

use crate::{
  model::{Engine, InferError, ModelLoadError, TensorSpec},
  tensor::{NormalizedTensor, RGB_CHANNELS, ScoreVector},
};

const TFLITE_NUM_INPUTS: usize = 1;
const TFLITE_NUM_OUTPUTS: usize = 1;
const INPUT_SLOT: usize = 0;
const OUTPUT_SLOT: usize = 0;

/// 编译后的 TFLite 分类模型
pub struct TfliteEngine {
  plan: TypedRunnableModel<TypedModel>,
  spec: TensorSpec,
}

/// 带上完整的错误链，而不只是最外层的上下文
fn describe(err: impl std::fmt::Display) -> String {
  format!("{err:#}")
}

fn invalid(msg: impl Into<String>) -> ModelLoadError {
  let msg = msg.into();
  error!("{}", msg);
  ModelLoadError::ModelInvalid(msg)
}

impl TfliteEngine {
  pub fn load(model_path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
    let model_path = model_path.as_ref();
    info!("加载模型文件: {}", model_path.display());
    let model_data = std::fs::read(model_path).map_err(|source| ModelLoadError::Io {
      path: model_path.display().to_string(),
      source,
    })?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let model = tract_tflite::tflite()
      .model_for_read(&mut model_data.as_slice())
      .map_err(|e| invalid(format!("无法解析 TFLite 模型: {}", describe(e))))?;

    if model.inputs.len() != TFLITE_NUM_INPUTS {
      return Err(invalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        TFLITE_NUM_INPUTS,
        model.inputs.len()
      )));
    }
    if model.outputs.len() != TFLITE_NUM_OUTPUTS {
      return Err(invalid(format!(
        "预期模型输出数量为 {}, 实际为 {}",
        TFLITE_NUM_OUTPUTS,
        model.outputs.len()
      )));
    }

    let spec = Self::resolve_spec(&model)?;
    debug!("模型张量信息: {:?}", spec);

    info!("编译推理计划");
    let plan = model
      .into_optimized()
      .and_then(|model| model.into_runnable())
      .map_err(|e| ModelLoadError::Runtime(describe(e)))?;
    info!("模型加载完成");

    Ok(Self { plan, spec })
  }

  fn resolve_spec(model: &TypedModel) -> Result<TensorSpec, ModelLoadError> {
    let input = model
      .input_fact(INPUT_SLOT)
      .map_err(|e| invalid(format!("无法获取输入张量信息: {}", describe(e))))?;
    if input.datum_type != f32::datum_type() {
      return Err(invalid(format!(
        "仅支持 f32 输入（未量化模型），实际为 {:?}",
        input.datum_type
      )));
    }
    let input_dims = input
      .shape
      .as_concrete()
      .ok_or_else(|| invalid(format!("输入形状不是定值: {:?}", input.shape)))?;
    let (height, width, channels) = match *input_dims {
      [1, height, width, channels] => (height, width, channels),
      _ => {
        return Err(invalid(format!(
          "预期输入形状为 [1, H, W, C], 实际为 {:?}",
          input_dims
        )));
      }
    };
    if channels != RGB_CHANNELS || height == 0 || width == 0 {
      return Err(invalid(format!(
        "预期 RGB 输入, 实际形状为 {:?}",
        input_dims
      )));
    }

    let output = model
      .output_fact(OUTPUT_SLOT)
      .map_err(|e| invalid(format!("无法获取输出张量信息: {}", describe(e))))?;
    let output_dims = output
      .shape
      .as_concrete()
      .ok_or_else(|| invalid(format!("输出形状不是定值: {:?}", output.shape)))?;
    let output_len = match *output_dims {
      [len] | [1, len] => len,
      _ => {
        return Err(invalid(format!(
          "预期输出形状为 [1, N], 实际为 {:?}",
          output_dims
        )));
      }
    };
    if output_len == 0 {
      return Err(invalid("模型输出长度为 0"));
    }

    Ok(TensorSpec {
      height,
      width,
      channels,
      output_slot: OUTPUT_SLOT,
      output_len,
    })
  }
}

impl Engine for TfliteEngine {
  fn spec(&self) -> TensorSpec {
    self.spec
  }

  fn run(&mut self, input: &NormalizedTensor) -> Result<ScoreVector, InferError> {
    debug!("设置模型输入");
    let tensor = Tensor::from_shape(&input.shape(), input.as_slice())
      .map_err(|e| InferError::Runtime(describe(e)))?;

    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(tensor.into()))
      .map_err(|e| InferError::Runtime(describe(e)))?;

    debug!("获取模型输出");
    let output = outputs
      .get(self.spec.output_slot)
      .ok_or_else(|| InferError::Runtime("model produced no output".to_string()))?;
    let scores = output
      .as_slice::<f32>()
      .map_err(|e| InferError::Runtime(describe(e)))?;

    Ok(scores.to_vec())
  }
}
