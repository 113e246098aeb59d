// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/args.rs - 服务参数配置
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

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use kentang::{classify::parse_threshold, server::ServerConfig};

/// Kentang 检测服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 监听地址
  #[arg(long, env = "KENTANG_HOST", default_value = "0.0.0.0")]
  pub host: String,

  /// 监听端口
  #[arg(long, env = "PORT", default_value = "8000")]
  pub port: u16,

  /// TFLite 模型文件路径
  #[arg(
    long,
    env = "KENTANG_MODEL",
    default_value = "model/model_unquant.tflite",
    value_name = "FILE"
  )]
  pub model: PathBuf,

  /// 标签文件路径（每行 `<index> <label>`）
  #[arg(
    long,
    env = "KENTANG_LABELS",
    default_value = "model/labels.txt",
    value_name = "FILE"
  )]
  pub labels: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(
    long,
    env = "KENTANG_THRESHOLD",
    default_value = "0.5",
    value_name = "THRESHOLD",
    value_parser = parse_threshold
  )]
  pub threshold: f32,

  /// 单个请求超时（秒）
  #[arg(long, default_value = "30", value_name = "SECONDS")]
  pub request_timeout_secs: u64,

  /// 上传文件大小上限（字节）
  #[arg(long, default_value = "10485760", value_name = "BYTES")]
  pub max_upload_bytes: usize,
}

impl Args {
  pub fn server_config(&self) -> ServerConfig {
    ServerConfig {
      request_timeout: Duration::from_secs(self.request_timeout_secs),
      max_upload_bytes: self.max_upload_bytes,
    }
  }
}
