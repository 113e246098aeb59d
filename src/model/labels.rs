// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/model/labels.rs - 标签文件解析
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

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelsLoadError {
  #[error("无法读取标签文件 {path}: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("标签文件第 {line} 行格式错误，应为 `<index> <label>`: {content:?}")]
  Malformed { line: usize, content: String },
  #[error("标签文件为空: {0}")]
  Empty(String),
}

/// 读取 `<index> <label>` 格式的标签文件
///
/// 序号只用于占位，标签顺序以文件中的行序为准。
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>, LabelsLoadError> {
  let path = path.as_ref();
  info!("加载标签文件: {}", path.display());
  let content = std::fs::read_to_string(path).map_err(|source| LabelsLoadError::Io {
    path: path.display().to_string(),
    source,
  })?;

  let labels = parse_labels(&content)?;
  if labels.is_empty() {
    return Err(LabelsLoadError::Empty(path.display().to_string()));
  }

  debug!("标签数量: {}", labels.len());
  Ok(labels)
}

pub fn parse_labels(content: &str) -> Result<Vec<String>, LabelsLoadError> {
  content
    .lines()
    .enumerate()
    .map(|(index, line)| (index + 1, line.trim()))
    .filter(|(_, line)| !line.is_empty())
    .map(|(line, content)| match content.split_once(' ') {
      Some((_, label)) if !label.trim().is_empty() => Ok(label.trim_start().to_string()),
      _ => Err(LabelsLoadError::Malformed {
        line,
        content: content.to_string(),
      }),
    })
    .collect()
}
