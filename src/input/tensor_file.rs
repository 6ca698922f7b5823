// 该文件是 Beifeng （北风） 项目的一部分。
// src/input/tensor_file.rs - 录制张量文件输入
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
  collections::VecDeque,
  path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, tensor::RawTensor};

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Tensor parse error: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("No tensor file found in {0}")]
  Empty(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TensorFile {
  One(RawTensor),
  Many(Vec<RawTensor>),
}

/// 从 JSON 文件或目录中依次读取录制的输出张量
///
/// 单个文件可以是一个张量 `{"shape": [...], "data": [...]}`，也可以是张量数组；
/// 目录按文件名顺序读取其中的 `*.json`。读取失败的文件记录错误后跳过。
pub struct TensorFileInput {
  files: VecDeque<PathBuf>,
  pending: VecDeque<RawTensor>,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemaMismatch);
    }
    Self::open(url.path())
  }
}

impl TensorFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, TensorFileInputError> {
    let path = path.as_ref();
    let files = if path.is_dir() {
      let mut files = Vec::new();
      for entry in std::fs::read_dir(path)? {
        let file = entry?.path();
        if file.extension().is_some_and(|ext| ext == "json") {
          files.push(file);
        }
      }
      files.sort();
      if files.is_empty() {
        return Err(TensorFileInputError::Empty(path.display().to_string()));
      }
      files
    } else {
      // 提前检查文件是否可读
      std::fs::metadata(path)?;
      vec![path.to_path_buf()]
    };

    debug!("张量输入共 {} 个文件", files.len());
    Ok(Self {
      files: files.into(),
      pending: VecDeque::new(),
    })
  }

  pub fn load(path: &Path) -> Result<Vec<RawTensor>, TensorFileInputError> {
    let content = std::fs::read_to_string(path)?;
    let tensors = match serde_json::from_str(&content)? {
      TensorFile::One(tensor) => vec![tensor],
      TensorFile::Many(tensors) => tensors,
    };
    debug!("从 {} 读取 {} 个张量", path.display(), tensors.len());
    Ok(tensors)
  }
}

impl Iterator for TensorFileInput {
  type Item = RawTensor;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      if let Some(tensor) = self.pending.pop_front() {
        return Some(tensor);
      }
      let file = self.files.pop_front()?;
      match Self::load(&file) {
        Ok(tensors) => self.pending.extend(tensors),
        Err(e) => error!("读取张量文件 {} 失败: {}", file.display(), e),
      }
    }
  }
}
