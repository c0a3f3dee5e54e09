// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/frame.rs - NHWC 帧定义
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

use image::RgbImage;

use crate::input::AsNhwcFrame;

const RGB_CHANNELS: usize = 3;

/// 送入推理后端的 uint8 输入张量，形状 `[1, H, W, 3]`
#[derive(Debug, Clone, PartialEq)]
pub struct RgbNhwcFrame {
  data: Box<[u8]>,
  height: usize,
  width: usize,
}

impl RgbNhwcFrame {
  /// 全零帧；元素数量溢出时返回 `None`
  pub fn with_shape(height: usize, width: usize) -> Option<Self> {
    let size = height.checked_mul(width)?.checked_mul(RGB_CHANNELS)?;
    Some(Self {
      data: vec![0u8; size].into_boxed_slice(),
      height,
      width,
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, self.height, self.width, RGB_CHANNELS]
  }
}

impl From<RgbImage> for RgbNhwcFrame {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    // RgbImage 的内存布局本身就是 HWC
    Self {
      data: image.into_raw().into_boxed_slice(),
      height: height as usize,
      width: width as usize,
    }
  }
}

impl AsMut<[u8]> for RgbNhwcFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsNhwcFrame for RgbNhwcFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;

  #[test]
  fn keeps_interleaved_layout() {
    let image = RgbImage::from_fn(2, 1, |x, _| Rgb([x as u8, 10 + x as u8, 20 + x as u8]));
    let frame = RgbNhwcFrame::from(image);
    assert_eq!(frame.shape(), [1, 1, 2, 3]);
    assert_eq!(frame.as_nhwc(), &[0, 10, 20, 1, 11, 21]);
  }

  #[test]
  fn with_shape_is_zeroed() {
    let mut frame = RgbNhwcFrame::with_shape(2, 3).unwrap();
    assert_eq!(frame.as_nhwc().len(), 18);
    frame.as_mut()[0] = 5;
    assert_eq!(frame.as_nhwc()[0], 5);
  }

  #[test]
  fn with_shape_rejects_overflow() {
    assert!(RgbNhwcFrame::with_shape(usize::MAX, 2).is_none());
  }
}
