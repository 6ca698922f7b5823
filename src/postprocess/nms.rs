// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use std::collections::VecDeque;

use crate::model::Candidate;

/// 同类别检测框的 IoU 超过该值即被抑制
pub const NMS_IOU_THRESHOLD: f32 = 0.3;

pub struct NonMaxSuppressor;

impl NonMaxSuppressor {
  /// 按置信度降序逐个接受候选，并移除与其同类且 IoU 大于阈值的其余候选。
  ///
  /// 排序是稳定的：置信度相同的候选保持输入顺序。
  pub fn apply(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut remaining = VecDeque::from(candidates);
    let mut accepted = Vec::new();

    while let Some(best) = remaining.pop_front() {
      remaining
        .retain(|c| c.class_index != best.class_index || best.bbox.iou(&c.bbox) <= iou_threshold);
      accepted.push(best);
    }

    accepted
  }
}
