// 该文件是 Beifeng （北风） 项目的一部分。
// src/output.rs - 输出定义
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

use std::borrow::Cow;

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  session::{Detection, Snapshot},
};

/// 渲染端：消费检测快照
pub trait Render {
  type Error;
  fn render_result(&self, snapshot: &Snapshot) -> Result<(), Self::Error>;
}

mod json_lines;
mod log_output;

pub use self::json_lines::{JsonLinesOutput, JsonLinesOutputError};
pub use self::log_output::LogOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("JSON Lines 输出错误: {0}")]
  JsonLinesOutputError(#[from] JsonLinesOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// URL 中带有 `mirror` 参数时沿 x 轴镜像输出
fn wants_mirror(url: &Url) -> bool {
  url.query_pairs().any(|(k, _)| k == "mirror")
}

/// 渲染前的显示变换
fn presented(snapshot: &Snapshot, mirror: bool) -> Cow<'_, [Detection]> {
  match (mirror, snapshot.canvas) {
    (true, Some(canvas)) => Cow::Owned(
      snapshot
        .detections
        .iter()
        .map(|d| d.mirrored(canvas.width))
        .collect(),
    ),
    _ => Cow::Borrowed(&snapshot.detections),
  }
}

pub enum OutputWrapper {
  Log(LogOutput),
  JsonLines(JsonLinesOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::Log(LogOutput::from_url(url)?)),
      JsonLinesOutput::SCHEME => Ok(OutputWrapper::JsonLines(JsonLinesOutput::from_url(url)?)),
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, snapshot: &Snapshot) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output.render_result(snapshot).map_err(OutputError::from),
      OutputWrapper::JsonLines(output) => {
        output.render_result(snapshot).map_err(OutputError::from)
      }
    }
  }
}
