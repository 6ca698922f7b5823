// 该文件是 Beifeng （北风） 项目的一部分。
// src/config.rs - 检测参数配置
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

use std::time::Duration;

use thiserror::Error;

use crate::{model::ModelInput, postprocess::MAX_MISSED_FRAMES};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 (0, 1] 之间, 实际为 {0}")]
  InvalidThreshold(f32),
  #[error("模型输入尺寸无效: {0}x{1}")]
  InvalidModelInput(f32, f32),
  #[error("重试次数至少为 1")]
  InvalidRetryAttempts,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
  /// 默认置信度阈值，每帧可单独指定
  pub confidence_threshold: f32,
  pub model_input: ModelInput,
  pub max_missed_frames: u32,
  /// 推理引擎失败时的最大尝试次数
  pub retry_attempts: u32,
  pub retry_delay: Duration,
  /// 推理繁忙时重新提交的间隔
  pub poll_interval: Duration,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: 0.5,
      model_input: ModelInput::default(),
      max_missed_frames: MAX_MISSED_FRAMES,
      retry_attempts: 3,
      retry_delay: Duration::from_millis(50),
      poll_interval: Duration::from_millis(5),
    }
  }
}

impl DetectorConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
    self.retry_attempts = attempts;
    self.retry_delay = delay;
    self
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    check_threshold(self.confidence_threshold)?;
    let ModelInput { width, height } = self.model_input;
    if !(width > 0.0 && height > 0.0) {
      return Err(ConfigError::InvalidModelInput(width, height));
    }
    if self.retry_attempts == 0 {
      return Err(ConfigError::InvalidRetryAttempts);
    }
    Ok(())
  }
}

pub fn check_threshold(threshold: f32) -> Result<(), ConfigError> {
  if threshold > 0.0 && threshold <= 1.0 {
    Ok(())
  } else {
    Err(ConfigError::InvalidThreshold(threshold))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_is_valid() {
    assert_eq!(DetectorConfig::default().validate(), Ok(()));
  }

  #[test]
  fn rejects_out_of_range_threshold() {
    for t in [0.0, -0.1, 1.5, f32::NAN] {
      let config = DetectorConfig::default().with_confidence_threshold(t);
      assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidThreshold(_))
      ));
    }
    assert!(check_threshold(1.0).is_ok());
  }

  #[test]
  fn rejects_zero_retries() {
    let config = DetectorConfig::default().with_retry(0, Duration::ZERO);
    assert_eq!(config.validate(), Err(ConfigError::InvalidRetryAttempts));
  }
}
