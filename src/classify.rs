// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/classify.rs - 阈值判定与 Top-K 排序
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

use thiserror::Error;
use tracing::error;

pub const DEFAULT_THRESHOLD: f32 = 0.5;
pub const TOP_K: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum ClassifyError {
  #[error("Label index {index} out of range for {labels} labels (model output and labels file disagree)")]
  LabelIndexError { index: usize, labels: usize },
  #[error("Model returned an empty score vector")]
  EmptyScores,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
  pub index: usize,
  pub label: String,
  pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
  pub detected: bool,
  pub top_label: Option<String>,
  pub top_confidence: f32,
  pub ranked_predictions: Vec<Prediction>,
}

/// 置信度的百分比表示，固定两位小数，如 `87.35%`
pub fn format_percentage(confidence: f32) -> String {
  format!("{:.2}%", f64::from(confidence) * 100.0)
}

// NaN 排在所有数值之后
fn rank_key(score: f32) -> f32 {
  if score.is_nan() {
    f32::NEG_INFINITY
  } else {
    score
  }
}

/// 最大值下标，并列时取最小下标
pub fn argmax(scores: &[f32]) -> Option<usize> {
  let mut best: Option<usize> = None;
  for (index, &score) in scores.iter().enumerate() {
    match best {
      Some(current) if rank_key(score) <= rank_key(scores[current]) => {}
      _ => best = Some(index),
    }
  }
  best
}

/// 分数从高到低的前 `k` 个下标，分数相同按下标升序
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
  let mut indices: Vec<usize> = (0..scores.len()).collect();
  indices.sort_by(|&a, &b| rank_key(scores[b]).total_cmp(&rank_key(scores[a])));
  indices.truncate(k);
  indices
}

fn resolve<'a>(labels: &'a [String], index: usize) -> Result<&'a str, ClassifyError> {
  labels.get(index).map(String::as_str).ok_or_else(|| {
    error!(
      "标签下标 {} 超出范围（共 {} 个标签），模型输出与标签文件不一致",
      index,
      labels.len()
    );
    ClassifyError::LabelIndexError {
      index,
      labels: labels.len(),
    }
  })
}

/// 将分数向量解析为检测结果
///
/// 最大分数低于 `threshold` 时不给出标签；等于阈值视为检出。
pub fn classify(
  scores: &[f32],
  labels: &[String],
  threshold: f32,
) -> Result<DetectionResult, ClassifyError> {
  let top_index = argmax(scores).ok_or(ClassifyError::EmptyScores)?;
  let top_confidence = scores[top_index];

  if top_confidence < threshold || top_confidence.is_nan() {
    return Ok(DetectionResult {
      detected: false,
      top_label: None,
      top_confidence,
      ranked_predictions: Vec::new(),
    });
  }

  let top_label = resolve(labels, top_index)?.to_string();
  let ranked_predictions = top_k(scores, TOP_K)
    .into_iter()
    .map(|index| {
      Ok(Prediction {
        index,
        label: resolve(labels, index)?.to_string(),
        confidence: scores[index],
      })
    })
    .collect::<Result<Vec<_>, ClassifyError>>()?;

  Ok(DetectionResult {
    detected: true,
    top_label: Some(top_label),
    top_confidence,
    ranked_predictions,
  })
}

/// 解析命令行中的置信度阈值，只接受 0.0 到 1.0
pub fn parse_threshold(value: &str) -> Result<f32, String> {
  let threshold: f32 = value
    .parse()
    .map_err(|e| format!("无效的阈值 {value:?}: {e}"))?;
  if !(0.0..=1.0).contains(&threshold) {
    return Err(format!("阈值必须在 0.0 到 1.0 之间, 实际为 {threshold}"));
  }
  Ok(threshold)
}
