// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/preprocess.rs - 图像解码与归一化
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

use crate::tensor::{InputShape, NormalizedTensor, RGB_CHANNELS};

/// 模型训练时使用的线性归一化系数，不可替换为均值/方差归一化
pub const PIXEL_SCALE: f32 = 255.0;

const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

#[derive(Error, Debug)]
pub enum PreprocessError {
  #[error("Error preprocessing image: {0}")]
  ImageDecodeError(image::ImageError),
  #[error("Error preprocessing image: {0}")]
  PreprocessingError(String),
}

impl From<image::ImageError> for PreprocessError {
  fn from(err: image::ImageError) -> Self {
    PreprocessError::ImageDecodeError(err)
  }
}

/// 原始图像字节 -> `[1, H, W, 3]` 归一化张量
///
/// 解码失败、颜色转换或缩放失败时不返回任何张量。
pub fn preprocess(raw: &[u8], shape: InputShape) -> Result<NormalizedTensor, PreprocessError> {
  if shape.channels != RGB_CHANNELS {
    return Err(PreprocessError::PreprocessingError(format!(
      "model expects {} channels, only RGB ({}) input is supported",
      shape.channels, RGB_CHANNELS
    )));
  }
  if shape.height == 0 || shape.width == 0 {
    return Err(PreprocessError::PreprocessingError(format!(
      "invalid target size {}x{}",
      shape.width, shape.height
    )));
  }

  let decoded = image::load_from_memory(raw)?;
  debug!(
    "解码图像: {}x{} {:?}",
    decoded.width(),
    decoded.height(),
    decoded.color()
  );

  // 透明通道直接丢弃，调色板与灰度图展开为 RGB
  let rgb = decoded.to_rgb8();
  let resized = resize(&rgb, shape)?;

  let data = normalize(&resized);
  NormalizedTensor::from_nhwc(shape, data).ok_or_else(|| {
    PreprocessError::PreprocessingError(format!("tensor does not match shape {}", shape))
  })
}

fn resize(image: &RgbImage, shape: InputShape) -> Result<RgbImage, PreprocessError> {
  let width = u32::try_from(shape.width)
    .map_err(|_| PreprocessError::PreprocessingError(format!("width {} too large", shape.width)))?;
  let height = u32::try_from(shape.height).map_err(|_| {
    PreprocessError::PreprocessingError(format!("height {} too large", shape.height))
  })?;

  if image.dimensions() == (width, height) {
    return Ok(image.clone());
  }
  Ok(image::imageops::resize(image, width, height, RESIZE_FILTER))
}

/// 按 NHWC 顺序展开像素并除以 255
fn normalize(image: &RgbImage) -> Vec<f32> {
  image
    .as_raw()
    .iter()
    .map(|&value| f32::from(value) / PIXEL_SCALE)
    .collect()
}
