// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/output.rs - 检测结果输出
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

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::classify::{DetectionResult, format_percentage};

pub const NOT_DETECTED_MESSAGE: &str = "No disease detected";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
  pub label: String,
  pub confidence: String,
}

/// 对外的检测结果结构（HTTP 响应体与命令行 JSON 输出共用）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectResponse {
  Detected {
    detected: bool,
    label: String,
    percentage: String,
    confidence: f32,
    top_predictions: Vec<RankedEntry>,
  },
  NotDetected {
    detected: bool,
    message: String,
    confidence: String,
  },
}

impl From<&DetectionResult> for DetectResponse {
  fn from(result: &DetectionResult) -> Self {
    match (&result.top_label, result.detected) {
      (Some(label), true) => DetectResponse::Detected {
        detected: true,
        label: label.clone(),
        percentage: format_percentage(result.top_confidence),
        confidence: result.top_confidence,
        top_predictions: result
          .ranked_predictions
          .iter()
          .map(|prediction| RankedEntry {
            label: prediction.label.clone(),
            confidence: format_percentage(prediction.confidence),
          })
          .collect(),
      },
      _ => DetectResponse::NotDetected {
        detected: false,
        message: NOT_DETECTED_MESSAGE.to_string(),
        confidence: format_percentage(result.top_confidence),
      },
    }
  }
}

#[derive(Error, Debug)]
pub enum RenderError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

pub trait Render {
  type Error;
  fn render_result(&mut self, result: &DetectionResult) -> Result<(), Self::Error>;
}

/// 以 HTTP 接口相同的 JSON 结构输出
pub struct JsonRender<W> {
  writer: W,
}

impl<W: Write> JsonRender<W> {
  pub fn new(writer: W) -> Self {
    Self { writer }
  }
}

impl<W: Write> Render for JsonRender<W> {
  type Error = RenderError;

  fn render_result(&mut self, result: &DetectionResult) -> Result<(), Self::Error> {
    serde_json::to_writer_pretty(&mut self.writer, &DetectResponse::from(result))?;
    writeln!(self.writer)?;
    Ok(())
  }
}

/// 人类可读的排名输出
pub struct TextRender<W> {
  writer: W,
}

impl<W: Write> TextRender<W> {
  pub fn new(writer: W) -> Self {
    Self { writer }
  }
}

impl<W: Write> Render for TextRender<W> {
  type Error = RenderError;

  fn render_result(&mut self, result: &DetectionResult) -> Result<(), Self::Error> {
    match &result.top_label {
      Some(label) if result.detected => {
        writeln!(self.writer, "Disease detected: {}", label)?;
        writeln!(
          self.writer,
          "Confidence: {}",
          format_percentage(result.top_confidence)
        )?;
        writeln!(self.writer, "Top {} predictions:", result.ranked_predictions.len())?;
        for (rank, prediction) in result.ranked_predictions.iter().enumerate() {
          writeln!(
            self.writer,
            "{}. {}: {}",
            rank + 1,
            prediction.label,
            format_percentage(prediction.confidence)
          )?;
        }
      }
      _ => {
        writeln!(self.writer, "{}", NOT_DETECTED_MESSAGE)?;
        writeln!(
          self.writer,
          "Confidence: {}",
          format_percentage(result.top_confidence)
        )?;
      }
    }
    Ok(())
  }
}
