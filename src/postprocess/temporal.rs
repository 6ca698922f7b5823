// 该文件是 Beifeng （北风） 项目的一部分。
// src/postprocess/temporal.rs - 跨帧闪烁平滑
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

use tracing::debug;

use crate::model::Candidate;

/// 连续丢失超过该帧数的检测被移除
pub const MAX_MISSED_FRAMES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedDetection {
  pub candidate: Candidate,
  pub missed_frames: u32,
}

/// 仅靠丢帧计数掩盖单帧漏检，不做跨帧身份关联
#[derive(Debug, Clone)]
pub struct TemporalTracker {
  tracked: Vec<TrackedDetection>,
  max_missed_frames: u32,
}

impl Default for TemporalTracker {
  fn default() -> Self {
    Self::new(MAX_MISSED_FRAMES)
  }
}

impl TemporalTracker {
  pub fn new(max_missed_frames: u32) -> Self {
    Self {
      tracked: Vec::new(),
      max_missed_frames,
    }
  }

  /// 非空帧整体替换跟踪集合；空帧令所有条目老化一帧
  pub fn update(&mut self, candidates: Vec<Candidate>) -> &[TrackedDetection] {
    if candidates.is_empty() {
      for tracked in &mut self.tracked {
        tracked.missed_frames += 1;
      }
      let before = self.tracked.len();
      let max_missed = self.max_missed_frames;
      self.tracked.retain(|t| t.missed_frames <= max_missed);
      if before != self.tracked.len() {
        debug!("移除 {} 个过期检测", before - self.tracked.len());
      }
    } else {
      self.tracked = candidates
        .into_iter()
        .map(|candidate| TrackedDetection {
          candidate,
          missed_frames: 0,
        })
        .collect();
    }
    &self.tracked
  }

  pub fn tracked(&self) -> &[TrackedDetection] {
    &self.tracked
  }

  pub fn clear(&mut self) {
    self.tracked.clear();
  }
}
