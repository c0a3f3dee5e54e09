// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/postprocess/remap.rs - 坐标反变换
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

use super::{Candidate, LetterboxTransform};
use crate::model::Detection;

/// 将 letterbox 坐标系下的候选框映射回原图，裁剪到 `[0, width] × [0, height]`。
///
/// 全程使用 f64，只在最后一步截断为整数像素。
pub fn remap_candidates(
  candidates: &[Candidate],
  transform: &LetterboxTransform,
  orig_width: u32,
  orig_height: u32,
) -> Vec<Detection> {
  let (w, h) = (orig_width as f64, orig_height as f64);

  candidates
    .iter()
    .map(|c| {
      let (x1, y1) = transform.to_original(c.bbox.x1 as f64, c.bbox.y1 as f64);
      let (x2, y2) = transform.to_original(c.bbox.x2 as f64, c.bbox.y2 as f64);
      Detection {
        class_id: c.class_id,
        score: c.score,
        bbox: [
          x1.clamp(0.0, w) as i32,
          y1.clamp(0.0, h) as i32,
          x2.clamp(0.0, w) as i32,
          y2.clamp(0.0, h) as i32,
        ],
      }
    })
    .collect()
}
