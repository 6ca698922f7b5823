// 该文件是 Beifeng （北风） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续解码
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

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use url::Url;

use beifeng::{
  FromUrl,
  config::DetectorConfig,
  engine::ReplayEngine,
  geometry::CanvasSize,
  input::TensorFileInput,
  labels::ClassRegistry,
  output::OutputWrapper,
  session::DetectionSession,
  task::{ContinuousTask, Task},
};
use tracing::info;

/// Beifeng 连续解码参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 录制的输出张量，如 tensor:///path/to/frames/
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，如 log://stdout 或 jsonl:///path/to/out.jsonl
  #[arg(long, value_name = "OUTPUT", default_value = "log://stdout")]
  pub output: Url,
  /// 类别表，如 labels://coco 或 labels:///path/to/labels.txt
  #[arg(long, value_name = "LABELS")]
  pub labels: Option<Url>,
  /// 置信度阈值 (0.0 - 1.0]
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub confidence: f32,
  /// 画布宽度
  #[arg(long, default_value = "640")]
  pub width: f32,
  /// 画布高度
  #[arg(long, default_value = "480")]
  pub height: f32,
  /// 最大处理帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
  /// 渲染间隔（毫秒）
  #[arg(long, default_value = "33")]
  pub render_interval_ms: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let registry = match &args.labels {
    Some(url) => ClassRegistry::from_url(url)?,
    None => ClassRegistry::default(),
  };
  let config = DetectorConfig::default().with_confidence_threshold(args.confidence);
  let session = DetectionSession::new(config, registry);

  let input = TensorFileInput::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  ContinuousTask::new(session, CanvasSize::new(args.width, args.height))
    .with_frame_number(args.frame_number)
    .with_render_interval(Duration::from_millis(args.render_interval_ms))
    .with_interrupt_handler()
    .run_task(input, ReplayEngine, output)?;

  Ok(())
}
