// 该文件是 Jianshi （鉴识） 项目的一部分。
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

use tracing::debug;

use super::{BBox, Candidate, NmsMode};

/// 交集宽高的附加量，避免零面积框之间的退化比较
const IOU_EPSILON: f32 = 1e-5;

/// 两个框的交并比
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  let xx1 = a.x1.max(b.x1);
  let yy1 = a.y1.max(b.y1);
  let xx2 = a.x2.min(b.x2);
  let yy2 = a.y2.min(b.y2);

  let w = (xx2 - xx1 + IOU_EPSILON).max(0.0);
  let h = (yy2 - yy1 + IOU_EPSILON).max(0.0);
  let inter = w * h;

  let union = a.area() + b.area() - inter;
  if union > 0.0 { inter / union } else { 0.0 }
}

fn greedy(
  boxes: &[BBox],
  scores: &[f32],
  nms_thresh: f32,
  comparable: impl Fn(usize, usize) -> bool,
) -> Vec<usize> {
  debug_assert_eq!(boxes.len(), scores.len());

  // 稳定排序：分数相同时先出现者在前
  let mut order: Vec<usize> = (0..boxes.len()).collect();
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let mut keep = Vec::new();
  while let Some((&i, rest)) = order.split_first() {
    keep.push(i);
    order = rest
      .iter()
      .copied()
      .filter(|&j| !comparable(i, j) || iou(&boxes[i], &boxes[j]) <= nms_thresh)
      .collect();
  }
  keep
}

/// 按分数降序的贪心非极大值抑制，不区分类别。
///
/// 返回保留下来的下标，顺序即保留顺序。与已保留框的 IoU 大于 `nms_thresh` 的框被抑制。
pub fn nms(boxes: &[BBox], scores: &[f32], nms_thresh: f32) -> Vec<usize> {
  greedy(boxes, scores, nms_thresh, |_, _| true)
}

/// 对候选框执行非极大值抑制，返回保留顺序下的候选框
pub fn nms_candidates(candidates: &[Candidate], mode: NmsMode, nms_thresh: f32) -> Vec<Candidate> {
  let boxes: Vec<BBox> = candidates.iter().map(|c| c.bbox).collect();
  let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();

  let keep = match mode {
    NmsMode::ClassAgnostic => nms(&boxes, &scores, nms_thresh),
    NmsMode::PerClass => greedy(&boxes, &scores, nms_thresh, |i, j| {
      candidates[i].class_id == candidates[j].class_id
    }),
  };

  debug!(
    "非极大值抑制 ({:?}): {} -> {}",
    mode,
    candidates.len(),
    keep.len()
  );
  keep.into_iter().map(|i| candidates[i]).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn iou_of_identical_and_disjoint_boxes() {
    let a = BBox::new(0.0, 0.0, 10.0, 10.0);
    assert!((iou(&a, &a) - 1.0).abs() < 1e-4);
    let b = BBox::new(20.0, 20.0, 30.0, 30.0);
    assert_eq!(iou(&a, &b), 0.0);
    let half = BBox::new(5.0, 0.0, 15.0, 10.0);
    assert!((iou(&a, &half) - 1.0 / 3.0).abs() < 1e-4);
  }

  #[test]
  fn iou_of_degenerate_boxes_is_zero() {
    let p = BBox::new(3.0, 3.0, 3.0, 3.0);
    assert_eq!(iou(&p, &p), 0.0);
  }

  #[test]
  fn suppression_chain_keeps_first_and_third() {
    // IoU(1, 2) = 0.6, IoU(2, 3) = 0.6, IoU(1, 3) = 1/3
    let boxes = [
      BBox::new(0.0, 0.0, 10.0, 10.0),
      BBox::new(2.5, 0.0, 12.5, 10.0),
      BBox::new(5.0, 0.0, 15.0, 10.0),
    ];
    assert!((iou(&boxes[0], &boxes[1]) - 0.6).abs() < 1e-4);
    assert!((iou(&boxes[1], &boxes[2]) - 0.6).abs() < 1e-4);
    let keep = nms(&boxes, &[0.9, 0.8, 0.7], 0.45);
    assert_eq!(keep, vec![0, 2]);
  }

  #[test]
  fn keep_order_is_descending_score() {
    let boxes = [
      BBox::new(0.0, 0.0, 1.0, 1.0),
      BBox::new(10.0, 0.0, 11.0, 1.0),
      BBox::new(20.0, 0.0, 21.0, 1.0),
    ];
    assert_eq!(nms(&boxes, &[0.3, 0.9, 0.6], 0.45), vec![1, 2, 0]);
  }

  #[test]
  fn equal_scores_keep_first_seen() {
    let b = BBox::new(0.0, 0.0, 10.0, 10.0);
    assert_eq!(nms(&[b, b, b], &[0.5, 0.5, 0.5], 0.45), vec![0]);
  }

  #[test]
  fn per_class_mode_only_suppresses_within_class() {
    let b = BBox::new(0.0, 0.0, 10.0, 10.0);
    let candidates = [
      Candidate { bbox: b, class_id: 0, score: 0.9 },
      Candidate { bbox: b, class_id: 1, score: 0.8 },
      Candidate { bbox: b, class_id: 0, score: 0.7 },
    ];
    let agnostic = nms_candidates(&candidates, NmsMode::ClassAgnostic, 0.45);
    assert_eq!(agnostic, vec![candidates[0]]);
    let per_class = nms_candidates(&candidates, NmsMode::PerClass, 0.45);
    assert_eq!(per_class, vec![candidates[0], candidates[1]]);
  }

  #[test]
  fn empty_input_gives_empty_keep() {
    assert!(nms(&[], &[], 0.45).is_empty());
  }
}
