// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/postprocess/letterbox.rs - 等比缩放加边填充
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

use image::{Rgb, RgbImage, imageops};
use serde::Serialize;
use tracing::debug;

use super::{InputSize, PostProcessError};

/// YOLO 系列模型常用的灰色填充
pub const LETTERBOX_FILL: Rgb<u8> = Rgb([114, 114, 114]);

/// letterbox 的几何参数，用于把检测框映射回原图
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LetterboxTransform {
  pub scale_ratio: f64,
  pub pad_x: f64,
  pub pad_y: f64,
  pub target_size: InputSize,
}

impl LetterboxTransform {
  /// 根据原图尺寸计算缩放比例与两侧填充，同时返回缩放后的尺寸
  pub fn compute(
    src_width: u32,
    src_height: u32,
    target: InputSize,
  ) -> Result<(Self, (u32, u32)), PostProcessError> {
    if src_width == 0 || src_height == 0 || target.width == 0 || target.height == 0 {
      return Err(PostProcessError::EmptyImage {
        width: src_width,
        height: src_height,
      });
    }

    let (tw, th) = (target.width as f64, target.height as f64);
    let (sw, sh) = (src_width as f64, src_height as f64);
    let scale_ratio = (th / sh).min(tw / sw);

    let resized_w = ((sw * scale_ratio).round() as u32).clamp(1, target.width);
    let resized_h = ((sh * scale_ratio).round() as u32).clamp(1, target.height);

    let transform = Self {
      scale_ratio,
      pad_x: (tw - resized_w as f64) / 2.0,
      pad_y: (th - resized_h as f64) / 2.0,
      target_size: target,
    };
    Ok((transform, (resized_w, resized_h)))
  }

  /// 左、上两侧的整数填充；奇数填充时多出的一个像素落在右、下两侧
  pub fn low_side_padding(&self) -> (u32, u32) {
    (
      (self.pad_x - 0.1).round().max(0.0) as u32,
      (self.pad_y - 0.1).round().max(0.0) as u32,
    )
  }

  /// 右、下两侧的整数填充
  pub fn high_side_padding(&self) -> (u32, u32) {
    (
      (self.pad_x + 0.1).round().max(0.0) as u32,
      (self.pad_y + 0.1).round().max(0.0) as u32,
    )
  }

  /// 原图坐标 → letterbox 坐标
  pub fn to_letterboxed(&self, x: f64, y: f64) -> (f64, f64) {
    (
      x * self.scale_ratio + self.pad_x,
      y * self.scale_ratio + self.pad_y,
    )
  }

  /// letterbox 坐标 → 原图坐标（未裁剪）
  pub fn to_original(&self, x: f64, y: f64) -> (f64, f64) {
    (
      (x - self.pad_x) / self.scale_ratio,
      (y - self.pad_y) / self.scale_ratio,
    )
  }
}

#[derive(Debug, Clone)]
pub struct Letterboxed {
  pub image: RgbImage,
  pub transform: LetterboxTransform,
}

/// 保持宽高比缩放到 `target`，其余部分以 `fill` 填充。输出尺寸总是等于 `target`。
pub fn letterbox(
  image: &RgbImage,
  target: InputSize,
  fill: Rgb<u8>,
) -> Result<Letterboxed, PostProcessError> {
  let (src_w, src_h) = image.dimensions();
  let (transform, (resized_w, resized_h)) = LetterboxTransform::compute(src_w, src_h, target)?;

  let mut canvas = RgbImage::from_pixel(target.width, target.height, fill);
  let (left, top) = transform.low_side_padding();

  if (resized_w, resized_h) == (src_w, src_h) {
    imageops::replace(&mut canvas, image, left as i64, top as i64);
  } else {
    let resized = imageops::resize(image, resized_w, resized_h, imageops::FilterType::Triangle);
    imageops::replace(&mut canvas, &resized, left as i64, top as i64);
  }

  debug!(
    "letterbox: {}x{} -> {}x{} (缩放 {:.4}, 填充 {:.1}, {:.1})",
    src_w, src_h, resized_w, resized_h, transform.scale_ratio, transform.pad_x, transform.pad_y
  );

  Ok(Letterboxed {
    image: canvas,
    transform,
  })
}
