// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/bin/detect_oneshot.rs - 单张图像检测
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

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use kentang::{
  ModelContext, Pipeline,
  classify::{DEFAULT_THRESHOLD, parse_threshold},
  output::{JsonRender, Render, TextRender},
};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
  Json,
  Text,
}

/// 对单张图像运行一次检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// TFLite 模型文件路径
  #[arg(long, default_value = "model/model_unquant.tflite", value_name = "FILE")]
  model: PathBuf,
  /// 标签文件路径
  #[arg(long, default_value = "model/labels.txt", value_name = "FILE")]
  labels: PathBuf,
  /// 输入图像
  #[arg(long, value_name = "IMAGE")]
  image: PathBuf,
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(
    long,
    default_value_t = DEFAULT_THRESHOLD,
    value_name = "THRESHOLD",
    value_parser = parse_threshold
  )]
  threshold: f32,
  /// 输出格式
  #[arg(long, value_enum, default_value = "text")]
  format: Format,
}

fn main() -> Result<()> {
  kentang::init_tracing();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model.display());
  info!("输入图像: {}", args.image.display());

  let context = ModelContext::load(&args.model, &args.labels).context("模型加载失败")?;
  let pipeline = Pipeline::new(Arc::new(context)).with_threshold(args.threshold);

  let raw = std::fs::read(&args.image)
    .with_context(|| format!("无法读取图像文件: {}", args.image.display()))?;

  info!("开始推理...");
  let now = std::time::Instant::now();
  let result = pipeline.detect(&raw)?;
  info!("推理完成，耗时: {:.2?}", now.elapsed());

  let stdout = std::io::stdout().lock();
  match args.format {
    Format::Json => JsonRender::new(stdout).render_result(&result)?,
    Format::Text => TextRender::new(stdout).render_result(&result)?,
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_is_range_checked() {
    let parse = |threshold: &str| {
      Args::try_parse_from([
        "detect-oneshot",
        "--image",
        "leaf.jpg",
        "--threshold",
        threshold,
      ])
    };
    assert!(parse("1.5").is_err());
    assert!(parse("-0.2").is_err());
    assert_eq!(parse("0.7").unwrap().threshold, 0.7);
  }

  #[test]
  fn threshold_defaults_to_half() {
    let args = Args::parse_from(["detect-oneshot", "--image", "leaf.jpg"]);
    assert_eq!(args.threshold, DEFAULT_THRESHOLD);
  }
}
