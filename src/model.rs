// 该文件是 Beifeng （北风） 项目的一部分。
// src/model.rs - 模型输出格式与候选检测
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

use crate::geometry::BBox;

/// 类别表为空时假定的类别数（COCO）
pub const DEFAULT_NUM_CLASSES: usize = 80;

/// 模型输入分辨率
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInput {
  pub width: f32,
  pub height: f32,
}

impl Default for ModelInput {
  fn default() -> Self {
    Self {
      width: 640.0,
      height: 640.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateFormat {
  /// (cx, cy, w, h)
  Center,
  /// (x1, y1, x2, y2)
  Corner,
}

/// 每条检测记录的布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
  /// 已后处理: x1, y1, x2, y2, conf, class_id
  PostProcessedCorner,
  /// cx, cy, w, h, 类别分数...
  NoObjectnessCenter,
  /// cx, cy, w, h, objectness, 类别 logits...
  StandardCenter,
  /// 未识别的记录长度，按无 objectness 的中心格式解码
  Custom,
}

impl RecordFormat {
  pub fn has_objectness(&self) -> bool {
    matches!(self, RecordFormat::StandardCenter)
  }

  pub fn coordinate_format(&self) -> CoordinateFormat {
    match self {
      RecordFormat::PostProcessedCorner => CoordinateFormat::Corner,
      _ => CoordinateFormat::Center,
    }
  }
}

/// 首次推理时推断出的张量布局，之后在会话内保持不变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
  pub detection_length: usize,
  pub num_detections: usize,
  pub transposed: bool,
  pub format: RecordFormat,
  pub num_classes: usize,
}

impl ModelInfo {
  pub fn has_objectness(&self) -> bool {
    self.format.has_objectness()
  }

  pub fn coordinate_format(&self) -> CoordinateFormat {
    self.format.coordinate_format()
  }
}

/// 解码出的候选检测
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub bbox: BBox,
  pub class_index: usize,
  pub confidence: f32,
}

mod decode;
mod format;

pub use self::decode::OutputDecoder;
pub use self::format::FormatDetector;
