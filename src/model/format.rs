// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/format.rs - 张量布局推断
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

use tracing::{debug, info, warn};

use crate::model::{ModelInfo, RecordFormat};

const POST_PROCESSED_LENGTH: usize = 6;

/// 根据输出形状推断记录长度、检测数量与是否转置
pub struct FormatDetector;

impl FormatDetector {
  /// `shape` 为 `[batch, dim1, dim2]`，`num_classes` 为类别表长度（为 0 时调用方应传入默认值）
  pub fn detect(shape: [usize; 3], num_classes: usize) -> ModelInfo {
    let [_, dim1, dim2] = shape;
    let expected = [
      num_classes + 5,
      num_classes + 4,
      POST_PROCESSED_LENGTH,
    ];

    let dim1_matches = expected.contains(&dim1);
    let dim2_matches = expected.contains(&dim2);
    debug!(
      "输出形状 {:?}, 期望记录长度 {:?}, dim1 匹配: {}, dim2 匹配: {}",
      shape, expected, dim1_matches, dim2_matches
    );

    let (detection_length, num_detections) = match (dim1_matches, dim2_matches) {
      (true, false) => (dim1, dim2),
      (false, true) => (dim2, dim1),
      _ => {
        warn!(
          "无法从形状 {:?} 唯一确定记录长度，按维度大小推断（较大者为检测数量）",
          shape
        );
        (dim1.min(dim2), dim1.max(dim2))
      }
    };
    let transposed = detection_length == dim1;

    let (format, num_classes) = if detection_length == POST_PROCESSED_LENGTH {
      (RecordFormat::PostProcessedCorner, num_classes)
    } else if detection_length == num_classes + 4 {
      (RecordFormat::NoObjectnessCenter, num_classes)
    } else if detection_length == num_classes + 5 {
      (RecordFormat::StandardCenter, num_classes)
    } else {
      let custom_classes = detection_length.saturating_sub(4).max(1);
      warn!(
        "未识别的记录长度 {}，按自定义格式解码，类别数调整为 {}",
        detection_length, custom_classes
      );
      (RecordFormat::Custom, custom_classes)
    };

    let info = ModelInfo {
      detection_length,
      num_detections,
      transposed,
      format,
      num_classes,
    };
    info!("模型输出格式: {:?}", info);
    info
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::CoordinateFormat;

  #[test]
  fn standard_row_major() {
    let info = FormatDetector::detect([1, 8400, 85], 80);
    assert!(!info.transposed);
    assert_eq!(info.detection_length, 85);
    assert_eq!(info.num_detections, 8400);
    assert!(info.has_objectness());
    assert_eq!(info.format, RecordFormat::StandardCenter);
  }

  #[test]
  fn no_objectness_transposed() {
    let info = FormatDetector::detect([1, 84, 8400], 80);
    assert!(info.transposed);
    assert_eq!(info.detection_length, 84);
    assert_eq!(info.num_detections, 8400);
    assert!(!info.has_objectness());
    assert_eq!(info.coordinate_format(), CoordinateFormat::Center);
  }

  #[test]
  fn post_processed_corner() {
    let info = FormatDetector::detect([1, 300, 6], 80);
    assert_eq!(info.format, RecordFormat::PostProcessedCorner);
    assert_eq!(info.coordinate_format(), CoordinateFormat::Corner);
    assert_eq!(info.num_detections, 300);
    assert!(!info.transposed);
  }

  #[test]
  fn ambiguous_falls_back_to_magnitude() {
    // 两个维度都不匹配
    let info = FormatDetector::detect([1, 10, 2000], 80);
    assert_eq!(info.detection_length, 10);
    assert_eq!(info.num_detections, 2000);
    assert!(info.transposed);
    assert_eq!(info.format, RecordFormat::Custom);
    assert_eq!(info.num_classes, 6);
  }

  #[test]
  fn both_dimensions_match() {
    let info = FormatDetector::detect([1, 85, 6], 80);
    assert_eq!(info.detection_length, 6);
    assert_eq!(info.num_detections, 85);
    assert!(!info.transposed);
    assert_eq!(info.format, RecordFormat::PostProcessedCorner);
  }

  #[test]
  fn custom_keeps_at_least_one_class() {
    let info = FormatDetector::detect([1, 3, 100], 80);
    assert_eq!(info.format, RecordFormat::Custom);
    assert_eq!(info.num_classes, 1);
  }
}
