// 该文件是 Beifeng （北风） 项目的一部分。
// tests/pipeline.rs - 解码流水线集成测试
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

use beifeng::{
  config::DetectorConfig,
  geometry::CanvasSize,
  labels::ClassRegistry,
  model::{FormatDetector, ModelInput, OutputDecoder, RecordFormat},
  postprocess::{NMS_IOU_THRESHOLD, NonMaxSuppressor},
  session::DetectionSession,
  tensor::RawTensor,
};

const CANVAS: CanvasSize = CanvasSize {
  width: 1000.0,
  height: 800.0,
};

/// `[1, rows, 6]` 的后处理格式张量
fn post_processed(rows: &[[f32; 6]]) -> RawTensor {
  let data: Vec<f32> = rows.iter().flatten().copied().collect();
  RawTensor::new(vec![1, rows.len(), 6], data)
}

fn three_class_session() -> DetectionSession {
  // 2 类时记录长度 6 会被识别为后处理格式
  DetectionSession::new(
    DetectorConfig::default(),
    ClassRegistry::new(vec!["cat".into(), "dog".into(), "bird".into()]),
  )
}

/// `[1, rows, 7]` 的无 objectness 张量（3 类）
fn no_objectness(rows: &[[f32; 7]]) -> RawTensor {
  let data: Vec<f32> = rows.iter().flatten().copied().collect();
  RawTensor::new(vec![1, rows.len(), 7], data)
}

#[test]
fn format_detection_examples() {
  let info = FormatDetector::detect([1, 8400, 85], 80);
  assert!(!info.transposed);
  assert_eq!(info.detection_length, 85);
  assert!(info.has_objectness());

  let info = FormatDetector::detect([1, 84, 8400], 80);
  assert!(info.transposed);
  assert_eq!(info.detection_length, 84);
  assert!(!info.has_objectness());
}

#[test]
fn overlapping_same_class_keeps_the_stronger() {
  let mut session = three_class_session();
  let frame = no_objectness(&[
    [0.50, 0.50, 0.20, 0.20, 0.90, 0.0, 0.0],
    [0.51, 0.50, 0.20, 0.20, 0.95, 0.0, 0.0],
  ]);
  let tracked = session.process(&frame, CANVAS, 0.5);
  assert_eq!(tracked.len(), 1);
  assert!((tracked[0].candidate.confidence - 0.95).abs() < 1e-6);

  let detections = session.detections();
  assert_eq!(detections[0].class_name, "cat");
}

#[test]
fn different_classes_both_survive() {
  let mut session = three_class_session();
  let frame = no_objectness(&[
    [0.50, 0.50, 0.20, 0.20, 0.90, 0.0, 0.0],
    [0.50, 0.50, 0.20, 0.20, 0.0, 0.80, 0.0],
  ]);
  assert_eq!(session.process(&frame, CANVAS, 0.5).len(), 2);
}

#[test]
fn normalized_center_box_lands_on_canvas() {
  let mut session = three_class_session();
  let frame = no_objectness(&[[0.5, 0.5, 0.2, 0.2, 0.0, 0.0, 0.7]]);
  let detections = {
    session.process(&frame, CANVAS, 0.5);
    session.detections()
  };
  assert_eq!(detections.len(), 1);
  let bbox = detections[0].bbox;
  assert!((bbox.x - 400.0).abs() < 1e-3);
  assert!((bbox.y - 320.0).abs() < 1e-3);
  assert!((bbox.width - 200.0).abs() < 1e-3);
  assert!((bbox.height - 160.0).abs() < 1e-3);
  assert_eq!(detections[0].class_name, "bird");
}

#[test]
fn threshold_is_applied_per_frame() {
  let mut session = three_class_session();
  let frame = no_objectness(&[[0.5, 0.5, 0.2, 0.2, 0.6, 0.0, 0.0]]);
  assert_eq!(session.process(&frame, CANVAS, 0.6).len(), 0);
  assert_eq!(session.process(&frame, CANVAS, 0.59).len(), 1);
}

#[test]
fn object_persists_through_three_empty_frames() {
  let mut session = three_class_session();
  let seen = no_objectness(&[[0.5, 0.5, 0.2, 0.2, 0.9, 0.0, 0.0]]);
  let empty = no_objectness(&[[0.5, 0.5, 0.2, 0.2, 0.1, 0.0, 0.0]]);

  assert_eq!(session.process(&seen, CANVAS, 0.5)[0].missed_frames, 0);
  for missed in 1..=3 {
    let tracked = session.process(&empty, CANVAS, 0.5);
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].missed_frames, missed);
  }
  assert!(session.process(&empty, CANVAS, 0.5).is_empty());
}

#[test]
fn post_processed_output_is_decoded() {
  let mut session = DetectionSession::new(DetectorConfig::default(), ClassRegistry::coco());
  let frame = post_processed(&[
    [64.0, 64.0, 320.0, 320.0, 0.88, 0.0],
    [400.0, 400.0, 600.0, 600.0, 0.70, 2.0],
  ]);
  session.process(&frame, CANVAS, 0.5);
  assert_eq!(
    session.model_info().map(|i| i.format),
    Some(RecordFormat::PostProcessedCorner)
  );
  let names: Vec<String> = session
    .detections()
    .into_iter()
    .map(|d| d.class_name)
    .collect();
  assert_eq!(names, vec!["person".to_string(), "car".to_string()]);
}

#[test]
fn decoded_confidences_are_bounded_and_nms_is_idempotent() {
  // 标准格式，80 类，随机风格的 logit
  let rows = 64;
  let len = 85;
  let mut data = Vec::with_capacity(rows * len);
  for i in 0..rows {
    let f = i as f32;
    data.extend_from_slice(&[
      300.0 + (f * 7.0) % 40.0,
      300.0 + (f * 11.0) % 40.0,
      80.0 + f % 10.0,
      90.0 + f % 7.0,
      (f % 9.0) - 4.0,
    ]);
    for c in 0..80 {
      data.push(((i * 31 + c * 17) % 23) as f32 - 11.0);
    }
  }
  let tensor = RawTensor::new(vec![1, rows, len], data);
  let info = FormatDetector::detect([1, rows, len], 80);
  let candidates = OutputDecoder::decode(&tensor, &info, CANVAS, ModelInput::default());
  assert!(!candidates.is_empty());
  assert!(
    candidates
      .iter()
      .all(|c| (0.0..=1.0).contains(&c.confidence))
  );

  let once = NonMaxSuppressor::apply(candidates, NMS_IOU_THRESHOLD);
  let twice = NonMaxSuppressor::apply(once.clone(), NMS_IOU_THRESHOLD);
  assert_eq!(once, twice);
}
