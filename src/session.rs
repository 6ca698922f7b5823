// 该文件是 Beifeng （北风） 项目的一部分。
// src/session.rs - 检测会话
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

use std::sync::OnceLock;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
  config::DetectorConfig,
  geometry::{BBox, CanvasSize},
  labels::ClassRegistry,
  model::{FormatDetector, ModelInfo, OutputDecoder},
  postprocess::{
    ConfidenceFilter, NMS_IOU_THRESHOLD, NonMaxSuppressor, TemporalTracker, TrackedDetection,
  },
  tensor::RawTensor,
};

/// 交给渲染端的检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub class_name: String,
  pub confidence: f32,
  pub bbox: BBox,
}

impl Detection {
  /// 沿 x 轴镜像，仅用于显示
  pub fn mirrored(&self, canvas_width: f32) -> Self {
    Self {
      bbox: self.bbox.mirrored(canvas_width),
      ..self.clone()
    }
  }
}

/// 某一时刻发布给渲染端的检测快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
  /// 每次发布递增
  pub sequence: u64,
  pub canvas: Option<CanvasSize>,
  pub detections: Vec<Detection>,
}

/// 一个模型会话内的全部检测状态
///
/// `ModelInfo` 在第一次解码时写入一次，此后不再重新推断，
/// 即使后续张量形状发生变化。
pub struct DetectionSession {
  config: DetectorConfig,
  registry: ClassRegistry,
  model_info: OnceLock<ModelInfo>,
  tracker: TemporalTracker,
}

impl DetectionSession {
  pub fn new(config: DetectorConfig, registry: ClassRegistry) -> Self {
    let tracker = TemporalTracker::new(config.max_missed_frames);
    Self {
      config,
      registry,
      model_info: OnceLock::new(),
      tracker,
    }
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn registry(&self) -> &ClassRegistry {
    &self.registry
  }

  pub fn model_info(&self) -> Option<&ModelInfo> {
    self.model_info.get()
  }

  pub fn is_detected(&self) -> bool {
    self.model_info.get().is_some()
  }

  /// 处理一帧输出张量，返回更新后的跟踪集合
  pub fn process(
    &mut self,
    tensor: &RawTensor,
    canvas: CanvasSize,
    threshold: f32,
  ) -> &[TrackedDetection] {
    let Some(shape) = tensor.dims3() else {
      warn!("输出张量阶数为 {}，期望为 3，跳过本帧", tensor.shape().len());
      return self.tracker.update(Vec::new());
    };

    let info = *self
      .model_info
      .get_or_init(|| FormatDetector::detect(shape, self.registry.num_classes_hint()));

    let candidates = OutputDecoder::decode(tensor, &info, canvas, self.config.model_input);
    let decoded = candidates.len();
    let candidates = ConfidenceFilter::apply(candidates, threshold);
    let filtered = candidates.len();
    let candidates = NonMaxSuppressor::apply(candidates, NMS_IOU_THRESHOLD);
    debug!(
      "候选数: 解码 {}, 过滤后 {}, NMS 后 {}",
      decoded,
      filtered,
      candidates.len()
    );

    self.tracker.update(candidates)
  }

  /// 推理失败的周期按零候选处理
  pub fn process_failure(&mut self) -> &[TrackedDetection] {
    self.tracker.update(Vec::new())
  }

  /// 切换输入源时清空跟踪集合，保留模型格式
  pub fn reset(&mut self) {
    self.tracker.clear();
  }

  pub fn tracked(&self) -> &[TrackedDetection] {
    self.tracker.tracked()
  }

  /// 解析类别名称后的当前检测列表
  pub fn detections(&self) -> Vec<Detection> {
    self
      .tracker
      .tracked()
      .iter()
      .map(|t| Detection {
        class_name: self.registry.name(t.candidate.class_index).into_owned(),
        confidence: t.candidate.confidence,
        bbox: t.candidate.bbox,
      })
      .collect()
  }

  pub fn snapshot(&self, sequence: u64, canvas: CanvasSize) -> Snapshot {
    Snapshot {
      sequence,
      canvas: Some(canvas),
      detections: self.detections(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const CANVAS: CanvasSize = CanvasSize {
    width: 640.0,
    height: 640.0,
  };

  fn session() -> DetectionSession {
    DetectionSession::new(
      DetectorConfig::default(),
      ClassRegistry::new(vec!["a".into(), "b".into()]),
    )
  }

  #[test]
  fn format_is_detected_once() {
    let mut session = session();
    assert!(!session.is_detected());
    let tensor = RawTensor::new(vec![1, 1, 7], vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.1, 0.1]);
    session.process(&tensor, CANVAS, 0.5);
    let first = *session.model_info().unwrap();
    assert_eq!(first.detection_length, 7);

    let other = RawTensor::new(vec![1, 84, 10], vec![0.0; 840]);
    session.process(&other, CANVAS, 0.5);
    assert_eq!(*session.model_info().unwrap(), first);
  }

  #[test]
  fn wrong_rank_ages_tracked_set() {
    let mut session = session();
    // 2 类时 4 + 2 = 6 与后处理格式重合，按后处理格式解释
    let tensor = RawTensor::new(vec![1, 1, 6], vec![0.5, 0.5, 0.2, 0.2, 0.9, 1.0]);
    assert_eq!(session.process(&tensor, CANVAS, 0.5).len(), 1);

    let flat = RawTensor::new(vec![6], vec![0.0; 6]);
    let out = session.process(&flat, CANVAS, 0.5);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].missed_frames, 1);
  }

  #[test]
  fn overflowing_shape_is_skipped() {
    let mut session = DetectionSession::new(DetectorConfig::default(), ClassRegistry::coco());
    let garbage = RawTensor::new(vec![1, 84, 1usize << 62], vec![0.5; 84]);
    assert!(session.process(&garbage, CANVAS, 0.5).is_empty());
    assert_eq!(session.model_info().map(|i| i.num_detections), Some(1usize << 62));

    // 格式只推断一次，后续帧仍按该格式校验长度
    let frame = RawTensor::new(vec![1, 84, 1], vec![0.5; 84]);
    assert!(session.process(&frame, CANVAS, 0.5).is_empty());
  }

  #[test]
  fn detections_resolve_class_names() {
    let mut session = session();
    let tensor = RawTensor::new(
      vec![1, 2, 6],
      vec![
        0.1, 0.1, 0.3, 0.3, 0.9, 1.0, //
        0.6, 0.6, 0.9, 0.9, 0.8, 9.0,
      ],
    );
    session.process(&tensor, CANVAS, 0.5);
    let names: Vec<String> = session
      .detections()
      .into_iter()
      .map(|d| d.class_name)
      .collect();
    assert_eq!(names, vec!["b".to_string(), "class_9".to_string()]);
  }

  #[test]
  fn reset_clears_but_keeps_format() {
    let mut session = session();
    let tensor = RawTensor::new(vec![1, 1, 6], vec![0.5, 0.5, 0.2, 0.2, 0.9, 0.0]);
    session.process(&tensor, CANVAS, 0.5);
    session.reset();
    assert!(session.tracked().is_empty());
    assert!(session.is_detected());
  }
}
