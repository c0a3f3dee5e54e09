// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/postprocess/decode.rs - 无锚框解码
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

use serde::Serialize;
use tracing::{debug, error};

use super::{
  BOX_CHANNELS, CLASS_CHANNEL_OFFSET, FeatureMap, InputSize, OBJECTNESS_CHANNEL, PostProcessConfig,
  PostProcessError,
};

/// 角点形式的边界框 `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl BBox {
  pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 中心形式 `(cx, cy, w, h)` 转角点形式
  pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  /// 面积，退化框按 0 计
  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  pub fn is_finite(&self) -> bool {
    self.x1.is_finite() && self.y1.is_finite() && self.x2.is_finite() && self.y2.is_finite()
  }
}

fn stride(axis: &'static str, input: u32, grid: usize) -> Result<f32, PostProcessError> {
  let input_len = input as usize;
  if grid == 0 || input_len % grid != 0 || input_len / grid == 0 {
    error!("{} 方向步长无效: 输入 {}, 网格 {}", axis, input, grid);
    return Err(PostProcessError::InvalidStride { axis, input, grid });
  }
  Ok((input_len / grid) as f32)
}

/// 将一个尺度的前 4 个通道解码为输入图（letterbox 后）坐标系下的角点框。
///
/// 网格单元 `(row, col)` 对应空间位置 `(col, row)`：
/// 中心 `(raw_xy + grid) * stride`，宽高 `exp(raw_wh) * stride`。
/// 输出顺序与网格的行优先展开一致。
pub fn decode_boxes(map: &FeatureMap, input: InputSize) -> Result<Vec<BBox>, PostProcessError> {
  if map.channels() < BOX_CHANNELS {
    return Err(PostProcessError::ChannelMismatch {
      expected: BOX_CHANNELS,
      actual: map.channels(),
    });
  }
  let stride_x = stride("x", input.width, map.grid_w())?;
  let stride_y = stride("y", input.height, map.grid_h())?;

  let (tx, ty, tw, th) = (map.plane(0), map.plane(1), map.plane(2), map.plane(3));
  let grid_w = map.grid_w();

  let mut boxes = Vec::with_capacity(map.cells());
  for row in 0..map.grid_h() {
    for col in 0..grid_w {
      let idx = row * grid_w + col;
      let cx = (tx[idx] + col as f32) * stride_x;
      let cy = (ty[idx] + row as f32) * stride_y;
      let w = tw[idx].exp() * stride_x;
      let h = th[idx].exp() * stride_y;
      boxes.push(BBox::from_center(cx, cy, w, h));
    }
  }
  Ok(boxes)
}

/// 所有尺度展开后的逐位置数据，每个位置一行。
///
/// 每个尺度的通道布局：`[0, 4)` 框参数，`4` 目标置信度，`[5, 5 + num_classes)` 类别概率。
/// 展开后 `boxes[i]`、`objectness[i]` 与 `class_row(i)` 描述同一位置。
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleOutputs {
  pub boxes: Vec<BBox>,
  pub objectness: Vec<f32>,
  /// 行优先 `(位置数, num_classes)`
  pub class_probs: Vec<f32>,
  num_classes: usize,
}

impl ScaleOutputs {
  pub fn new(num_classes: usize) -> Self {
    Self {
      boxes: Vec::new(),
      objectness: Vec::new(),
      class_probs: Vec::new(),
      num_classes,
    }
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn class_row(&self, i: usize) -> &[f32] {
    &self.class_probs[i * self.num_classes..(i + 1) * self.num_classes]
  }

  /// 按顺序拼接另一尺度的结果，两者类别数必须一致
  pub fn append(&mut self, mut other: ScaleOutputs) -> Result<(), PostProcessError> {
    if other.num_classes != self.num_classes {
      error!(
        "拼接尺度类别数不一致: 期望 {}, 实际 {}",
        self.num_classes, other.num_classes
      );
      return Err(PostProcessError::ChannelMismatch {
        expected: CLASS_CHANNEL_OFFSET + self.num_classes,
        actual: CLASS_CHANNEL_OFFSET + other.num_classes,
      });
    }
    self.boxes.append(&mut other.boxes);
    self.objectness.append(&mut other.objectness);
    self.class_probs.append(&mut other.class_probs);
    Ok(())
  }
}

/// 校验并解码单个尺度，展开为 `(H*W, C)` 形式
pub fn flatten_scale(
  map: &FeatureMap,
  config: &PostProcessConfig,
) -> Result<ScaleOutputs, PostProcessError> {
  let expected = config.channels();
  if map.channels() != expected {
    error!("特征图通道数错误: 期望 {}, 实际 {}", expected, map.channels());
    return Err(PostProcessError::ChannelMismatch {
      expected,
      actual: map.channels(),
    });
  }

  let boxes = decode_boxes(map, config.input_size())?;
  let objectness = map.plane(OBJECTNESS_CHANNEL).to_vec();

  let num_classes = config.num_classes();
  let mut class_probs = vec![0.0f32; map.cells() * num_classes];
  for c in 0..num_classes {
    for (cell, &p) in map.plane(CLASS_CHANNEL_OFFSET + c).iter().enumerate() {
      class_probs[cell * num_classes + c] = p;
    }
  }

  debug!(
    "尺度 {}x{} 解码完成: {} 个位置",
    map.grid_h(),
    map.grid_w(),
    boxes.len()
  );

  Ok(ScaleOutputs {
    boxes,
    objectness,
    class_probs,
    num_classes,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn map_with(channels: usize, grid_h: usize, grid_w: usize, fill: impl Fn(usize, usize) -> f32) -> FeatureMap {
    let cells = grid_h * grid_w;
    let data = (0..channels * cells).map(|i| fill(i / cells, i % cells)).collect();
    FeatureMap::new(&[1, channels, grid_h, grid_w], data).unwrap()
  }

  #[test]
  fn zero_offsets_decode_to_stride_sized_boxes() {
    let map = map_with(4, 20, 20, |_, _| 0.0);
    let boxes = decode_boxes(&map, InputSize::square(640)).unwrap();
    assert_eq!(boxes.len(), 400);
    // stride 32，exp(0) = 1
    assert_eq!(boxes[0], BBox::new(-16.0, -16.0, 16.0, 16.0));
    // (row 1, col 2)
    assert_eq!(boxes[22], BBox::new(48.0, 16.0, 80.0, 48.0));
  }

  #[test]
  fn offsets_shift_centre_and_scale_size() {
    let map = map_with(4, 2, 2, |c, _| match c {
      0 => 0.5,
      1 => 0.25,
      _ => 2f32.ln(),
    });
    let boxes = decode_boxes(&map, InputSize::new(16, 8)).unwrap();
    // stride_x = 8, stride_y = 4, cell (1, 1)
    let b = boxes[3];
    assert!((b.x1 - (12.0 - 8.0)).abs() < 1e-4);
    assert!((b.y1 - (5.0 - 4.0)).abs() < 1e-4);
    assert!((b.x2 - (12.0 + 8.0)).abs() < 1e-4);
    assert!((b.y2 - (5.0 + 4.0)).abs() < 1e-4);
  }

  #[test]
  fn rejects_non_integer_stride() {
    let map = map_with(4, 3, 3, |_, _| 0.0);
    assert_eq!(
      decode_boxes(&map, InputSize::square(640)),
      Err(PostProcessError::InvalidStride {
        axis: "x",
        input: 640,
        grid: 3
      })
    );
    let map = map_with(4, 1, 8, |_, _| 0.0);
    assert!(decode_boxes(&map, InputSize::new(4, 4)).is_err());
  }

  #[test]
  fn flatten_transposes_class_planes() {
    let config = PostProcessConfig::default()
      .with_num_classes(2)
      .with_input_size(InputSize::square(4));
    let map = map_with(7, 1, 2, |c, cell| (c * 10 + cell) as f32);
    let flat = flatten_scale(&map, &config).unwrap();
    assert_eq!(flat.len(), 2);
    assert_eq!(flat.objectness, vec![40.0, 41.0]);
    assert_eq!(flat.class_row(0), &[50.0, 60.0]);
    assert_eq!(flat.class_row(1), &[51.0, 61.0]);
  }

  #[test]
  fn append_requires_same_class_count() {
    let two = PostProcessConfig::default()
      .with_num_classes(2)
      .with_input_size(InputSize::square(4));
    let three = two.clone().with_num_classes(3);
    let map2 = map_with(7, 1, 2, |c, cell| (c * 10 + cell) as f32);
    let map3 = map_with(8, 1, 2, |_, _| 0.0);

    let mut acc = ScaleOutputs::new(2);
    acc.append(flatten_scale(&map2, &two).unwrap()).unwrap();
    acc.append(flatten_scale(&map2, &two).unwrap()).unwrap();
    assert_eq!(acc.len(), 4);
    assert_eq!(acc.class_row(3), &[51.0, 61.0]);

    assert_eq!(
      acc.append(flatten_scale(&map3, &three).unwrap()),
      Err(PostProcessError::ChannelMismatch {
        expected: 7,
        actual: 8
      })
    );
    assert_eq!(acc.len(), 4);
  }

  #[test]
  fn flatten_checks_channel_count() {
    let config = PostProcessConfig::default();
    let map = map_with(84, 20, 20, |_, _| 0.0);
    assert_eq!(
      flatten_scale(&map, &config),
      Err(PostProcessError::ChannelMismatch {
        expected: 85,
        actual: 84
      })
    );
  }
}
