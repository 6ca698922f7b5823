// 该文件是 Beifeng （北风） 项目的一部分。
// src/labels.rs - 类别名称表
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
use std::path::Path;

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, model::DEFAULT_NUM_CLASSES};

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("类别表解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 按索引访问的类别名称表，只读
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassRegistry {
  names: Vec<String>,
}

impl ClassRegistry {
  pub fn new(names: Vec<String>) -> Self {
    Self { names }
  }

  pub fn coco() -> Self {
    Self::new(COCO_CLASSES.iter().map(|s| s.to_string()).collect())
  }

  /// 读取类别文件：`.json` 为字符串数组，其余按行读取并跳过空行
  pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let names = if path.extension().is_some_and(|ext| ext == "json") {
      serde_json::from_str::<Vec<String>>(&content)?
    } else {
      content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
    };
    info!("从 {} 加载 {} 个类别", path.display(), names.len());
    Ok(Self::new(names))
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// 用于格式推断的类别数，空表时为 80
  pub fn num_classes_hint(&self) -> usize {
    if self.names.is_empty() {
      DEFAULT_NUM_CLASSES
    } else {
      self.names.len()
    }
  }

  /// 越界索引返回占位名称
  pub fn name(&self, index: usize) -> Cow<'_, str> {
    match self.names.get(index) {
      Some(name) => Cow::Borrowed(name.as_str()),
      None => Cow::Owned(format!("class_{}", index)),
    }
  }
}

impl FromUrlWithScheme for ClassRegistry {
  const SCHEME: &'static str = "labels";
}

impl FromUrl for ClassRegistry {
  type Error = LabelError;

  /// `labels://coco` 为内置 COCO 表，`labels:///path/to/file` 读取文件
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(LabelError::SchemeMismatch(url.scheme().to_string()));
    }

    if url.host_str() == Some("coco") {
      return Ok(Self::coco());
    }
    Self::load(url.path())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn placeholder_for_out_of_range() {
    let registry = ClassRegistry::new(vec!["cat".into(), "dog".into()]);
    assert_eq!(registry.name(1), "dog");
    assert_eq!(registry.name(7), "class_7");
  }

  #[test]
  fn empty_registry_hints_eighty_classes() {
    assert_eq!(ClassRegistry::default().num_classes_hint(), 80);
    assert_eq!(ClassRegistry::coco().num_classes_hint(), 80);
    assert_eq!(ClassRegistry::new(vec!["a".into()]).num_classes_hint(), 1);
  }

  #[test]
  fn loads_text_and_json() {
    let mut text = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(text, "person\n\n  car \nbus").unwrap();
    let registry = ClassRegistry::load(text.path()).unwrap();
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.name(1), "car");

    let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(json, r#"["a", "b"]"#).unwrap();
    let registry = ClassRegistry::load(json.path()).unwrap();
    assert_eq!(registry.name(0), "a");
    assert_eq!(registry.len(), 2);
  }

  #[test]
  fn from_url() {
    let url = Url::parse("labels://coco").unwrap();
    assert_eq!(ClassRegistry::from_url(&url).unwrap().name(0), "person");
    let url = Url::parse("jsonl:///tmp/x").unwrap();
    assert!(matches!(
      ClassRegistry::from_url(&url),
      Err(LabelError::SchemeMismatch(_))
    ));
  }
}
