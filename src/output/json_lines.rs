// 该文件是 Beifeng （北风） 项目的一部分。
// src/output/json_lines.rs - JSON Lines 记录输出
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

use std::{
  fs::{File, OpenOptions},
  io::Write,
  path::Path,
  sync::Mutex,
};

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Render, presented, wants_mirror},
  session::Snapshot,
};

#[derive(Error, Debug)]
pub enum JsonLinesOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

/// 每个快照追加一行 JSON 记录
pub struct JsonLinesOutput {
  file: Mutex<File>,
  mirror: bool,
}

impl FromUrlWithScheme for JsonLinesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonLinesOutputError::SchemeMismatch);
    }
    Self::create(url.path(), wants_mirror(url))
  }
}

impl JsonLinesOutput {
  pub fn create(path: impl AsRef<Path>, mirror: bool) -> Result<Self, JsonLinesOutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    info!("检测记录写入: {}", path.display());
    Ok(Self {
      file: Mutex::new(file),
      mirror,
    })
  }
}

impl Render for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn render_result(&self, snapshot: &Snapshot) -> Result<(), Self::Error> {
    let record = json!({
      "timestamp": Utc::now().to_rfc3339(),
      "sequence": snapshot.sequence,
      "canvas": snapshot.canvas,
      "detections": presented(snapshot, self.mirror),
    });
    let line = serde_json::to_string(&record)?;

    let mut file = self
      .file
      .lock()
      .unwrap_or_else(std::sync::PoisonError::into_inner);
    writeln!(file, "{}", line)?;
    file.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    geometry::{BBox, CanvasSize},
    session::Detection,
  };

  #[test]
  fn appends_one_line_per_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records").join("out.jsonl");
    let url = Url::parse(&format!("jsonl://{}?mirror", path.display())).unwrap();
    let output = JsonLinesOutput::from_url(&url).unwrap();

    let snapshot = Snapshot {
      sequence: 7,
      canvas: Some(CanvasSize::new(200.0, 100.0)),
      detections: vec![Detection {
        class_name: "person".into(),
        confidence: 0.75,
        bbox: BBox::new(10.0, 20.0, 30.0, 40.0),
      }],
    };
    output.render_result(&snapshot).unwrap();
    output.render_result(&Snapshot::default()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["sequence"], 7);
    assert_eq!(first["detections"][0]["class_name"], "person");
    assert_eq!(first["detections"][0]["bbox"]["x"], 160.0);
    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(second["detections"].as_array().unwrap().len(), 0);
  }
}
