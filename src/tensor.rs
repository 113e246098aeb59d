// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/tensor.rs - NHWC 浮点张量定义
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

use std::fmt;

pub const RGB_CHANNELS: usize = 3;

/// 模型输入形状（不含批次维度），NHWC 布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
  pub height: usize,
  pub width: usize,
  pub channels: usize,
}

impl InputShape {
  pub fn new(height: usize, width: usize, channels: usize) -> Self {
    Self {
      height,
      width,
      channels,
    }
  }

  /// 带批次维度 1 的完整形状 `[1, H, W, C]`
  pub fn batched(&self) -> [usize; 4] {
    [1, self.height, self.width, self.channels]
  }

  pub fn element_count(&self) -> usize {
    self.height * self.width * self.channels
  }
}

impl fmt::Display for InputShape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}x{}", self.height, self.width, self.channels)
  }
}

/// 归一化后的输入张量，形状 `[1, H, W, C]`，取值范围 [0.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
  shape: [usize; 4],
  data: Box<[f32]>,
}

impl NormalizedTensor {
  /// 数据长度与形状不一致时返回 `None`，不会构造出残缺的张量
  pub fn from_nhwc(shape: InputShape, data: Vec<f32>) -> Option<Self> {
    if data.len() != shape.element_count() {
      return None;
    }

    Some(Self {
      shape: shape.batched(),
      data: data.into_boxed_slice(),
    })
  }

  pub fn shape(&self) -> [usize; 4] {
    self.shape
  }

  pub fn height(&self) -> usize {
    self.shape[1]
  }

  pub fn width(&self) -> usize {
    self.shape[2]
  }

  pub fn channels(&self) -> usize {
    self.shape[3]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  /// 取 (y, x, c) 位置的值，越界返回 `None`
  pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f32> {
    if y >= self.height() || x >= self.width() || c >= self.channels() {
      return None;
    }
    let index = (y * self.width() + x) * self.channels() + c;
    self.data.get(index).copied()
  }
}

/// 一次推理得到的原始分数，与标签按下标对齐
pub type ScoreVector = Vec<f32>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_mismatched_length() {
    let shape = InputShape::new(2, 2, RGB_CHANNELS);
    assert!(NormalizedTensor::from_nhwc(shape, vec![0.0; 11]).is_none());
    assert!(NormalizedTensor::from_nhwc(shape, vec![0.0; 12]).is_some());
  }

  #[test]
  fn indexes_in_nhwc_order() {
    let shape = InputShape::new(1, 2, RGB_CHANNELS);
    let tensor =
      NormalizedTensor::from_nhwc(shape, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();

    assert_eq!(tensor.shape(), [1, 1, 2, 3]);
    assert_eq!(tensor.get(0, 1, 0), Some(0.3));
    assert_eq!(tensor.get(0, 0, 2), Some(0.2));
    assert_eq!(tensor.get(1, 0, 0), None);
  }
}
