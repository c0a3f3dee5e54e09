// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/postprocess/pipeline.rs - 后处理流水线
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

use super::{
  FeatureMap, LetterboxTransform, PostProcessConfig, PostProcessError, ScaleOutputs,
  filter_candidates, flatten_scale, nms_candidates, remap_candidates,
};
use crate::model::DetectResult;

/// 将全部尺度的原始输出转换为原图坐标系下的检测结果。
///
/// 各尺度依次解码、展开并拼接，然后执行置信度过滤、非极大值抑制与坐标反变换。
/// 没有目标时返回空结果；只有形状或配置错误才返回 `Err`。
/// `maps` 为空表示上游没有产生任何输出，返回 [`PostProcessError::NoFeatureMaps`]。
pub fn post_process(
  maps: &[FeatureMap],
  config: &PostProcessConfig,
  transform: &LetterboxTransform,
  orig_width: u32,
  orig_height: u32,
) -> Result<DetectResult, PostProcessError> {
  config.validate()?;
  if maps.is_empty() {
    return Err(PostProcessError::NoFeatureMaps);
  }

  let outputs = maps.iter().try_fold(
    ScaleOutputs::new(config.num_classes()),
    |mut acc, map| -> Result<_, PostProcessError> {
      acc.append(flatten_scale(map, config)?)?;
      Ok(acc)
    },
  )?;
  debug!("{} 个尺度共 {} 个位置", maps.len(), outputs.len());

  let candidates = filter_candidates(&outputs, config.obj_thresh());
  if candidates.is_empty() {
    debug!("没有候选框通过置信度阈值");
    return Ok(DetectResult::empty());
  }

  let mut kept = nms_candidates(&candidates, config.nms_mode(), config.nms_thresh());
  if let Some(max) = config.max_detections()
    && kept.len() > max
  {
    debug!("检测数量 {} 超过上限 {}, 截断", kept.len(), max);
    kept.truncate(max);
  }

  let items = remap_candidates(&kept, transform, orig_width, orig_height);
  debug!("最终检测到 {} 个目标", items.len());

  Ok(DetectResult {
    items: items.into_boxed_slice(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::postprocess::InputSize;

  /// 单尺度特征图，只有一个位置带有目标
  fn single_hit_map(grid: usize, num_classes: usize, cell: usize, obj: f32, class: usize) -> FeatureMap {
    let channels = 5 + num_classes;
    let cells = grid * grid;
    let mut data = vec![0.0f32; channels * cells];
    data[4 * cells + cell] = obj;
    data[(5 + class) * cells + cell] = 1.0;
    FeatureMap::new(&[1, channels, grid, grid], data).unwrap()
  }

  fn identity(size: u32) -> LetterboxTransform {
    LetterboxTransform::compute(size, size, InputSize::square(size)).unwrap().0
  }

  #[test]
  fn single_location_becomes_single_detection() {
    let config = PostProcessConfig::default()
      .with_num_classes(2)
      .with_input_size(InputSize::square(64));
    // 8x8 网格，步长 8，cell (row 1, col 2)
    let map = single_hit_map(8, 2, 10, 0.9, 1);
    let result = post_process(&[map], &config, &identity(64), 64, 64).unwrap();
    assert_eq!(result.items.len(), 1);
    let det = &result.items[0];
    assert_eq!(det.class_id, 1);
    assert!((det.score - 0.9).abs() < 1e-6);
    // 中心 (16, 8)，宽高 8
    assert_eq!(det.bbox, [12, 4, 20, 12]);
  }

  #[test]
  fn all_zero_objectness_is_empty_not_error() {
    let config = PostProcessConfig::default()
      .with_num_classes(2)
      .with_input_size(InputSize::square(64));
    let maps = [
      single_hit_map(8, 2, 0, 0.0, 0),
      single_hit_map(4, 2, 0, 0.0, 0),
      single_hit_map(2, 2, 0, 0.0, 0),
    ];
    let result = post_process(&maps, &config, &identity(64), 64, 64).unwrap();
    assert!(result.is_empty());
  }

  #[test]
  fn non_finite_boxes_are_dropped() {
    let config = PostProcessConfig::default()
      .with_num_classes(1)
      .with_input_size(InputSize::square(64));
    let cells = 64;
    let mut data = vec![0.0f32; 6 * cells];
    for cell in [3usize, 20, 41] {
      data[4 * cells + cell] = 0.9;
      data[5 * cells + cell] = 1.0;
    }
    // NaN 偏移，exp 溢出的宽度，NaN 高度
    data[3] = f32::NAN;
    data[2 * cells + 20] = 1e4;
    data[3 * cells + 41] = f32::NAN;
    let map = FeatureMap::new(&[1, 6, 8, 8], data).unwrap();
    let result = post_process(&[map], &config, &identity(64), 64, 64).unwrap();
    assert!(result.is_empty());
  }

  #[test]
  fn channel_mismatch_is_fatal() {
    let config = PostProcessConfig::default().with_input_size(InputSize::square(64));
    let map = single_hit_map(8, 2, 0, 0.9, 0);
    assert_eq!(
      post_process(&[map], &config, &identity(64), 64, 64),
      Err(PostProcessError::ChannelMismatch {
        expected: 85,
        actual: 7
      })
    );
  }

  #[test]
  fn no_maps_is_distinct_from_no_detections() {
    let config = PostProcessConfig::default();
    assert_eq!(
      post_process(&[], &config, &identity(640), 640, 640),
      Err(PostProcessError::NoFeatureMaps)
    );
  }

  #[test]
  fn max_detections_truncates_in_keep_order() {
    let config = PostProcessConfig::default()
      .with_num_classes(1)
      .with_input_size(InputSize::square(64))
      .with_max_detections(Some(2));
    let cells = 64;
    let mut data = vec![0.0f32; 6 * cells];
    for (cell, obj) in [(0usize, 0.5f32), (18, 0.9), (36, 0.7), (54, 0.6)] {
      data[4 * cells + cell] = obj;
      data[5 * cells + cell] = 1.0;
    }
    let map = FeatureMap::new(&[1, 6, 8, 8], data).unwrap();
    let result = post_process(&[map], &config, &identity(64), 64, 64).unwrap();
    let scores: Vec<f32> = result.items.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![0.9, 0.7]);
  }
}
