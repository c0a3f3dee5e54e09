// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/postprocess/tensor.rs - 特征图张量
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

use tracing::error;

use super::PostProcessError;

/// 单个检测尺度的输出，NCHW 排列，形状 `[1, C, H, W]`
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMap {
  data: Box<[f32]>,
  channels: usize,
  grid_h: usize,
  grid_w: usize,
}

fn check_shape(shape: &[usize], len: usize) -> Result<(usize, usize, usize), PostProcessError> {
  let &[batch, channels, grid_h, grid_w] = shape else {
    error!("特征图维度错误: {:?}", shape);
    return Err(PostProcessError::InvalidRank(shape.to_vec()));
  };
  if batch != 1 {
    error!("特征图批大小错误: {}", batch);
    return Err(PostProcessError::InvalidBatch(batch));
  }
  let Some(expected) = channels
    .checked_mul(grid_h)
    .and_then(|v| v.checked_mul(grid_w))
  else {
    error!("特征图形状溢出: {:?}", shape);
    return Err(PostProcessError::ShapeOverflow(shape.to_vec()));
  };
  if expected != len {
    error!("特征图数据长度错误: 期望 {}, 实际 {}", expected, len);
    return Err(PostProcessError::DataLength {
      expected,
      actual: len,
    });
  }
  Ok((channels, grid_h, grid_w))
}

impl FeatureMap {
  /// 从浮点输出构造特征图，`shape` 必须为 `[1, C, H, W]`
  pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Self, PostProcessError> {
    let (channels, grid_h, grid_w) = check_shape(shape, data.len())?;
    Ok(Self {
      data: data.into_boxed_slice(),
      channels,
      grid_h,
      grid_w,
    })
  }

  /// 从非对称仿射量化的 int8 输出构造特征图：`(q - zp) * scale`
  pub fn from_quantized(
    shape: &[usize],
    data: &[i8],
    zero_point: i32,
    scale: f32,
  ) -> Result<Self, PostProcessError> {
    let (channels, grid_h, grid_w) = check_shape(shape, data.len())?;
    let data = data
      .iter()
      .map(|&q| (q as i32 - zero_point) as f32 * scale)
      .collect();
    Ok(Self {
      data,
      channels,
      grid_h,
      grid_w,
    })
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, self.channels, self.grid_h, self.grid_w]
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn grid_h(&self) -> usize {
    self.grid_h
  }

  pub fn grid_w(&self) -> usize {
    self.grid_w
  }

  /// 网格单元数 `H * W`
  pub fn cells(&self) -> usize {
    self.grid_h * self.grid_w
  }

  /// 第 `c` 个通道的平面，按行优先排列
  pub fn plane(&self, c: usize) -> &[f32] {
    let cells = self.cells();
    &self.data[c * cells..(c + 1) * cells]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn planes_follow_nchw_layout() {
    let data: Vec<f32> = (0..2 * 2 * 3).map(|v| v as f32).collect();
    let map = FeatureMap::new(&[1, 2, 2, 3], data).unwrap();
    assert_eq!(map.cells(), 6);
    assert_eq!(map.plane(0), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(map.plane(1), &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    assert_eq!(map.shape(), [1, 2, 2, 3]);
  }

  #[test]
  fn rejects_bad_shapes() {
    assert_eq!(
      FeatureMap::new(&[2, 2], vec![0.0; 4]),
      Err(PostProcessError::InvalidRank(vec![2, 2]))
    );
    assert_eq!(
      FeatureMap::new(&[2, 1, 1, 1], vec![0.0; 2]),
      Err(PostProcessError::InvalidBatch(2))
    );
    assert_eq!(
      FeatureMap::new(&[1, 1, 2, 2], vec![0.0; 3]),
      Err(PostProcessError::DataLength {
        expected: 4,
        actual: 3
      })
    );
  }

  #[test]
  fn overflowing_shape_is_an_error() {
    assert_eq!(
      FeatureMap::new(&[1, usize::MAX, 2, 1], Vec::new()),
      Err(PostProcessError::ShapeOverflow(vec![1, usize::MAX, 2, 1]))
    );
    assert!(FeatureMap::from_quantized(&[1, 2, usize::MAX, usize::MAX], &[], 0, 1.0).is_err());
  }

  #[test]
  fn dequantizes_int8() {
    let map = FeatureMap::from_quantized(&[1, 1, 1, 3], &[-128, 0, 127], -128, 0.5).unwrap();
    assert_eq!(map.as_slice(), &[0.0, 64.0, 127.5]);
  }
}
