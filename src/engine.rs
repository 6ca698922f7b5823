// 该文件是 Beifeng （北风） 项目的一部分。
// src/engine.rs - 推理引擎接口
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

use std::{convert::Infallible, fmt::Display, thread, time::Duration};

use tracing::{debug, error, warn};

use crate::tensor::RawTensor;

/// 推理引擎：输入一帧，输出原始检测张量
pub trait InferenceEngine {
  type Input;
  type Error;

  fn run(&mut self, input: &Self::Input) -> Result<RawTensor, Self::Error>;
}

/// 回放已录制的输出张量
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayEngine;

impl InferenceEngine for ReplayEngine {
  type Input = RawTensor;
  type Error = Infallible;

  fn run(&mut self, input: &Self::Input) -> Result<RawTensor, Self::Error> {
    Ok(input.clone())
  }
}

/// 失败后间隔 `delay` 重试，最多尝试 `attempts` 次；全部失败返回 None
pub fn run_with_retry<E>(
  engine: &mut E,
  input: &E::Input,
  attempts: u32,
  delay: Duration,
) -> Option<RawTensor>
where
  E: InferenceEngine,
  E::Error: Display,
{
  for attempt in 1..=attempts {
    match engine.run(input) {
      Ok(tensor) => {
        debug!("推理成功，输出形状 {:?}", tensor.shape());
        return Some(tensor);
      }
      Err(e) if attempt < attempts => {
        warn!("第 {} 次推理失败: {}，{:?} 后重试", attempt, e, delay);
        thread::sleep(delay);
      }
      Err(e) => {
        error!("推理失败 {} 次，放弃本帧: {}", attempts, e);
      }
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Flaky {
    failures: u32,
    calls: u32,
  }

  impl InferenceEngine for Flaky {
    type Input = ();
    type Error = String;

    fn run(&mut self, _input: &()) -> Result<RawTensor, String> {
      self.calls += 1;
      if self.calls <= self.failures {
        Err("busy".to_string())
      } else {
        Ok(RawTensor::new(vec![1, 1, 6], vec![0.0; 6]))
      }
    }
  }

  #[test]
  fn retries_until_success() {
    let mut engine = Flaky {
      failures: 2,
      calls: 0,
    };
    assert!(run_with_retry(&mut engine, &(), 3, Duration::ZERO).is_some());
    assert_eq!(engine.calls, 3);
  }

  #[test]
  fn gives_up_after_attempts() {
    let mut engine = Flaky {
      failures: 10,
      calls: 0,
    };
    assert!(run_with_retry(&mut engine, &(), 3, Duration::ZERO).is_none());
    assert_eq!(engine.calls, 3);
  }

  #[test]
  fn replay_returns_input() {
    let tensor = RawTensor::new(vec![1, 1, 6], vec![1.0; 6]);
    assert_eq!(ReplayEngine.run(&tensor).unwrap(), tensor);
  }
}
