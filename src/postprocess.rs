// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/postprocess.rs - YOLOX 后处理
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

//! 将多尺度原始输出张量转换为原图坐标系下的检测结果。
//!
//! 处理顺序：letterbox 预处理 → (外部推理) → 逐尺度解码 → 置信度过滤
//! → 非极大值抑制 → 坐标反变换。每个阶段都是纯函数，可单独测试。

use thiserror::Error;

mod config;
mod decode;
mod filter;
mod letterbox;
mod nms;
mod pipeline;
mod remap;
mod tensor;

pub use self::config::{InputSize, NmsMode, PostProcessConfig};
pub use self::decode::{BBox, ScaleOutputs, decode_boxes, flatten_scale};
pub use self::filter::{Candidate, filter_candidates};
pub use self::letterbox::{LETTERBOX_FILL, Letterboxed, LetterboxTransform, letterbox};
pub use self::nms::{iou, nms, nms_candidates};
pub use self::pipeline::post_process;
pub use self::remap::remap_candidates;
pub use self::tensor::FeatureMap;

/// 每个位置的固定通道：4 个框参数 + 1 个目标置信度
pub const BOX_CHANNELS: usize = 4;
pub const OBJECTNESS_CHANNEL: usize = 4;
pub const CLASS_CHANNEL_OFFSET: usize = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PostProcessError {
  #[error("张量维度错误: 期望形状 [1, C, H, W], 实际形状 {0:?}")]
  InvalidRank(Vec<usize>),
  #[error("批大小必须为 1, 实际为 {0}")]
  InvalidBatch(usize),
  #[error("张量形状过大, 元素数量溢出: {0:?}")]
  ShapeOverflow(Vec<usize>),
  #[error("张量数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  DataLength { expected: usize, actual: usize },
  #[error("通道数不匹配: 期望 {expected}, 实际 {actual}")]
  ChannelMismatch { expected: usize, actual: usize },
  #[error("{axis} 方向步长无效: 输入尺寸 {input} 与网格尺寸 {grid} 无法整除")]
  InvalidStride {
    axis: &'static str,
    input: u32,
    grid: usize,
  },
  #[error("推理输出为空: 没有可处理的特征图")]
  NoFeatureMaps,
  #[error("配置无效: {0}")]
  InvalidConfig(String),
  #[error("图像尺寸无效: {width}x{height}")]
  EmptyImage { width: u32, height: u32 },
}
