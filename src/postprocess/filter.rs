// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/postprocess/filter.rs - 置信度过滤
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

use tracing::{debug, warn};

use super::{BBox, ScaleOutputs};

/// 通过置信度过滤的候选框（letterbox 坐标系）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub bbox: BBox,
  pub class_id: u32,
  pub score: f32,
}

/// 返回最大值及其下标，相同最大值取第一个
fn argmax(row: &[f32]) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (i, &v) in row.iter().enumerate() {
    match best {
      Some((_, b)) if v <= b => {}
      _ => best = Some((i, v)),
    }
  }
  best
}

/// 对每个位置取最高类别概率，乘以目标置信度后按 `obj_thresh` 过滤。
///
/// 含 NaN 或无穷值的位置视为置信度 0，直接丢弃。没有位置通过时返回空列表。
pub fn filter_candidates(outputs: &ScaleOutputs, obj_thresh: f32) -> Vec<Candidate> {
  let mut candidates = Vec::new();
  let mut degenerate = 0usize;

  for (i, (bbox, &objectness)) in outputs.boxes.iter().zip(&outputs.objectness).enumerate() {
    let row = outputs.class_row(i);
    if !objectness.is_finite() || row.iter().any(|p| !p.is_finite()) || !bbox.is_finite() {
      degenerate += 1;
      continue;
    }
    let Some((class_id, class_score)) = argmax(row) else {
      continue;
    };

    let score = class_score * objectness;
    if !score.is_finite() {
      degenerate += 1;
      continue;
    }
    if score >= obj_thresh {
      candidates.push(Candidate {
        bbox: *bbox,
        class_id: class_id as u32,
        score,
      });
    }
  }

  if degenerate > 0 {
    warn!("跳过 {} 个包含非有限值的位置", degenerate);
  }
  debug!(
    "置信度过滤: {} / {} 个位置通过 (阈值 {})",
    candidates.len(),
    outputs.len(),
    obj_thresh
  );
  candidates
}

#[cfg(test)]
mod tests {
  use super::*;

  fn outputs(rows: &[(f32, [f32; 3])]) -> ScaleOutputs {
    let mut out = ScaleOutputs::new(3);
    for (i, (obj, probs)) in rows.iter().enumerate() {
      let x = i as f32 * 10.0;
      out.boxes.push(BBox::new(x, 0.0, x + 5.0, 5.0));
      out.objectness.push(*obj);
      out.class_probs.extend_from_slice(probs);
    }
    out
  }

  #[test]
  fn combines_best_class_with_objectness() {
    let out = outputs(&[
      (0.9, [0.1, 0.8, 0.3]),
      (0.5, [0.4, 0.2, 0.4]),
      (0.1, [1.0, 0.0, 0.0]),
    ]);
    let kept = filter_candidates(&out, 0.3);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].class_id, 1);
    assert!((kept[0].score - 0.72).abs() < 1e-6);

    // 并列最大值取第一个类别
    let kept = filter_candidates(&out, 0.1);
    assert_eq!(kept.len(), 3);
    assert_eq!(kept[1].class_id, 0);
    assert!((kept[1].score - 0.2).abs() < 1e-6);
  }

  #[test]
  fn threshold_is_inclusive() {
    let out = outputs(&[(0.5, [0.5, 0.0, 0.0])]);
    assert_eq!(filter_candidates(&out, 0.25).len(), 1);
  }

  #[test]
  fn non_finite_locations_are_dropped() {
    let out = outputs(&[
      (f32::NAN, [1.0, 1.0, 1.0]),
      (1.0, [f32::INFINITY, 0.0, 0.0]),
      (1.0, [0.9, f32::NAN, 0.0]),
      (1.0, [0.9, 0.0, 0.0]),
    ]);
    let kept = filter_candidates(&out, 0.0);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].bbox.x1, 30.0);
  }

  #[test]
  fn empty_when_nothing_passes() {
    let out = outputs(&[(0.0, [0.0; 3]), (0.0, [0.0; 3])]);
    assert!(filter_candidates(&out, 0.25).is_empty());
    assert!(filter_candidates(&ScaleOutputs::new(3), 0.25).is_empty());
  }
}
