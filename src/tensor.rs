// 该文件是 Beifeng （北风） 项目的一部分。
// src/tensor.rs - 推理输出张量
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

use serde::{Deserialize, Serialize};

/// 推理引擎输出的原始张量：扁平数据加形状描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTensor {
  shape: Vec<usize>,
  data: Box<[f32]>,
}

impl RawTensor {
  pub fn new(shape: Vec<usize>, data: impl Into<Box<[f32]>>) -> Self {
    Self {
      shape,
      data: data.into(),
    }
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  /// 三阶形状 `[batch, dim1, dim2]`，阶数不为 3 时返回 None
  pub fn dims3(&self) -> Option<[usize; 3]> {
    match self.shape.as_slice() {
      &[batch, dim1, dim2] => Some([batch, dim1, dim2]),
      _ => None,
    }
  }

  /// 越界读取返回 NaN，交由边界框校验过滤
  pub fn value(&self, index: usize) -> f32 {
    self.data.get(index).copied().unwrap_or(f32::NAN)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dims3_requires_rank_three() {
    let t = RawTensor::new(vec![1, 2, 3], vec![0.0; 6]);
    assert_eq!(t.dims3(), Some([1, 2, 3]));
    let t = RawTensor::new(vec![6], vec![0.0; 6]);
    assert_eq!(t.dims3(), None);
    let t = RawTensor::new(vec![1, 1, 2, 3], vec![0.0; 6]);
    assert_eq!(t.dims3(), None);
  }

  #[test]
  fn out_of_range_reads_are_nan() {
    let t = RawTensor::new(vec![1, 1, 2], vec![1.0, 2.0]);
    assert_eq!(t.value(1), 2.0);
    assert!(t.value(2).is_nan());
  }
}
