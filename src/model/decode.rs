// 该文件是 Beifeng （北风） 项目的一部分。
// src/model/decode.rs - 输出张量解码
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

use tracing::{debug, warn};

use crate::{
  geometry::{BBox, CanvasSize},
  model::{Candidate, CoordinateFormat, ModelInfo, ModelInput, RecordFormat},
  tensor::RawTensor,
};

/// 小于该尺寸（像素）的框视为退化
const MIN_BOX_SIZE: f32 = 5.0;

/// 按 ModelInfo 描述的布局读取第 `row` 条记录的第 `field` 个字段
struct RecordView<'a> {
  tensor: &'a RawTensor,
  info: &'a ModelInfo,
}

impl RecordView<'_> {
  fn field(&self, row: usize, field: usize) -> f32 {
    if field >= self.info.detection_length {
      return f32::NAN;
    }
    let index = if self.info.transposed {
      field
        .checked_mul(self.info.num_detections)
        .and_then(|i| i.checked_add(row))
    } else {
      row
        .checked_mul(self.info.detection_length)
        .and_then(|i| i.checked_add(field))
    };
    index.map_or(f32::NAN, |i| self.tensor.value(i))
  }

  fn coords(&self, row: usize) -> [f32; 4] {
    [
      self.field(row, 0),
      self.field(row, 1),
      self.field(row, 2),
      self.field(row, 3),
    ]
  }

  /// 从 `offset` 开始的类别分数中取最大值，返回 (分数, 类别索引)
  fn best_class(&self, row: usize, offset: usize, squash: impl Fn(f32) -> f32) -> (f32, usize) {
    let mut best_score = f32::NEG_INFINITY;
    let mut best_class = 0usize;
    for c in 0..self.info.num_classes {
      let score = squash(self.field(row, offset + c));
      if score > best_score {
        best_score = score;
        best_class = c;
      }
    }
    (best_score, best_class)
  }
}

/// 未归一化的单行解码结果
struct RawRecord {
  coords: [f32; 4],
  class_index: usize,
  confidence: f32,
}

pub struct OutputDecoder;

impl OutputDecoder {
  /// 将一帧输出张量解码为候选检测，输出顺序与记录顺序一致
  pub fn decode(
    tensor: &RawTensor,
    info: &ModelInfo,
    canvas: CanvasSize,
    model_input: ModelInput,
  ) -> Vec<Candidate> {
    // 形状描述的元素数超出数据长度时整帧放弃
    let required = info.num_detections.checked_mul(info.detection_length);
    if !required.is_some_and(|n| n <= tensor.data().len()) {
      warn!(
        "张量数据长度 {} 与格式 {}x{} 不符，跳过本帧",
        tensor.data().len(),
        info.num_detections,
        info.detection_length
      );
      return Vec::new();
    }

    let view = RecordView { tensor, info };
    let mut candidates = Vec::new();

    for row in 0..info.num_detections {
      let record = match info.format {
        RecordFormat::PostProcessedCorner => decode_post_processed(&view, row),
        RecordFormat::NoObjectnessCenter | RecordFormat::Custom => {
          Some(decode_no_objectness(&view, row))
        }
        RecordFormat::StandardCenter => Some(decode_standard(&view, row)),
      };
      let Some(record) = record else {
        continue;
      };

      let bbox = to_canvas(record.coords, info.coordinate_format(), canvas, model_input);
      if is_valid(&bbox, record.confidence, canvas) {
        candidates.push(Candidate {
          bbox,
          class_index: record.class_index,
          confidence: record.confidence,
        });
      }
    }

    debug!(
      "解码 {} 条记录，得到 {} 个候选",
      info.num_detections,
      candidates.len()
    );
    candidates
  }
}

fn decode_post_processed(view: &RecordView, row: usize) -> Option<RawRecord> {
  let raw_conf = view.field(row, 4);
  let class_id = view.field(row, 5).round();
  if !class_id.is_finite() || class_id < 0.0 {
    return None;
  }
  let confidence = if raw_conf.abs() > 1.0 {
    sigmoid(raw_conf)
  } else {
    raw_conf
  };
  Some(RawRecord {
    coords: view.coords(row),
    class_index: class_id as usize,
    confidence,
  })
}

fn decode_no_objectness(view: &RecordView, row: usize) -> RawRecord {
  let (confidence, class_index) = view.best_class(row, 4, squash_logit);
  RawRecord {
    coords: view.coords(row),
    class_index,
    confidence,
  }
}

fn decode_standard(view: &RecordView, row: usize) -> RawRecord {
  let objectness = sigmoid(view.field(row, 4));
  let (class_score, class_index) = view.best_class(row, 5, sigmoid);
  RawRecord {
    coords: view.coords(row),
    class_index,
    confidence: objectness * class_score,
  }
}

/// 归一化坐标直接乘画布尺寸，否则视为模型输入分辨率下的像素坐标
fn to_canvas(
  coords: [f32; 4],
  format: CoordinateFormat,
  canvas: CanvasSize,
  model_input: ModelInput,
) -> BBox {
  let normalized = coords.iter().all(|v| (0.0..=1.0).contains(v));
  let (sx, sy) = if normalized {
    (canvas.width, canvas.height)
  } else {
    (
      canvas.width / model_input.width,
      canvas.height / model_input.height,
    )
  };

  let [a, b, c, d] = coords;
  match format {
    CoordinateFormat::Center => BBox::from_center(a * sx, b * sy, c * sx, d * sy),
    CoordinateFormat::Corner => BBox::from_corners(a * sx, b * sy, c * sx, d * sy),
  }
}

/// 所有比较都写成正向条件，NaN 会被拒绝
fn is_valid(bbox: &BBox, confidence: f32, canvas: CanvasSize) -> bool {
  bbox.width >= MIN_BOX_SIZE
    && bbox.height >= MIN_BOX_SIZE
    && bbox.right() >= -canvas.width
    && bbox.x <= 2.0 * canvas.width
    && bbox.bottom() >= -canvas.height
    && bbox.y <= 2.0 * canvas.height
    && (0.0..=1.0).contains(&confidence)
}

/// 大于 1 的分数视为 logit
fn squash_logit(x: f32) -> f32 {
  if x > 1.0 { sigmoid(x) } else { x }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
