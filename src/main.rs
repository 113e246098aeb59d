// 该文件是 Kentang （马铃薯叶病检测） 项目的一部分。
// src/main.rs - 检测服务主程序
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

mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use kentang::{
  ModelContext, Pipeline,
  server::{AppState, router},
};

#[tokio::main]
async fn main() -> Result<()> {
  kentang::init_tracing();

  let args = args::Args::parse();

  info!("Kentang 马铃薯叶病检测服务");
  info!("模型文件路径: {}", args.model.display());
  info!("标签文件路径: {}", args.labels.display());
  info!("置信度阈值: {}", args.threshold);

  // 模型加载失败时不对外提供服务
  info!("正在加载模型...");
  let context = ModelContext::load(&args.model, &args.labels).with_context(|| {
    format!(
      "无法加载模型 {} 或标签 {}",
      args.model.display(),
      args.labels.display()
    )
  })?;
  info!("可检测类别: {}", context.labels().join(", "));

  let state = Arc::new(AppState {
    pipeline: Pipeline::new(Arc::new(context)).with_threshold(args.threshold),
    model_path: args.model.clone(),
    labels_path: args.labels.clone(),
  });
  let app = router(state, args.server_config());

  let address = format!("{}:{}", args.host, args.port);
  let listener = tokio::net::TcpListener::bind(&address)
    .await
    .with_context(|| format!("无法监听地址: {}", address))?;
  info!("服务启动: http://{}", address);
  info!("健康检查: http://{}/health", address);
  info!("交互页面: http://{}/ui", address);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("服务异常退出")?;

  info!("服务已停止");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!("无法监听中断信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到中断信号，准备退出...");
}
