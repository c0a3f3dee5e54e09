// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/postprocess/config.rs - 后处理配置
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

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use super::PostProcessError;

const DEFAULT_OBJ_THRESH: f32 = 0.25;
const DEFAULT_NMS_THRESH: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_NUM_CLASSES: usize = 80;

/// 模型输入尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSize {
  pub width: u32,
  pub height: u32,
}

impl InputSize {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub const fn square(size: u32) -> Self {
    Self::new(size, size)
  }
}

impl Default for InputSize {
  fn default() -> Self {
    Self::square(DEFAULT_INPUT_SIZE)
  }
}

impl fmt::Display for InputSize {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

/// 解析 `640x640` 或 `640` 形式的尺寸
impl FromStr for InputSize {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parse = |v: &str| {
      v.trim()
        .parse::<u32>()
        .map_err(|e| format!("无法解析尺寸 '{}': {}", v, e))
    };
    match s.split_once(['x', 'X']) {
      Some((w, h)) => Ok(Self::new(parse(w)?, parse(h)?)),
      None => Ok(Self::square(parse(s)?)),
    }
  }
}

/// 非极大值抑制的作用范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NmsMode {
  /// 所有类别共同参与抑制
  #[default]
  ClassAgnostic,
  /// 仅在同一类别内部抑制
  PerClass,
}

/// 后处理配置。创建后不可变，可在多个线程间共享。
#[derive(Debug, Clone, PartialEq)]
pub struct PostProcessConfig {
  obj_thresh: f32,
  nms_thresh: f32,
  input_size: InputSize,
  num_classes: usize,
  class_names: Option<Arc<[String]>>,
  nms_mode: NmsMode,
  max_detections: Option<usize>,
}

impl Default for PostProcessConfig {
  fn default() -> Self {
    Self {
      obj_thresh: DEFAULT_OBJ_THRESH,
      nms_thresh: DEFAULT_NMS_THRESH,
      input_size: InputSize::default(),
      num_classes: DEFAULT_NUM_CLASSES,
      class_names: None,
      nms_mode: NmsMode::default(),
      max_detections: None,
    }
  }
}

impl PostProcessConfig {
  pub fn with_obj_thresh(mut self, obj_thresh: f32) -> Self {
    self.obj_thresh = obj_thresh;
    self
  }

  pub fn with_nms_thresh(mut self, nms_thresh: f32) -> Self {
    self.nms_thresh = nms_thresh;
    self
  }

  pub fn with_input_size(mut self, input_size: InputSize) -> Self {
    self.input_size = input_size;
    self
  }

  pub fn with_num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = num_classes;
    self
  }

  pub fn with_class_names<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.class_names = Some(names.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_nms_mode(mut self, nms_mode: NmsMode) -> Self {
    self.nms_mode = nms_mode;
    self
  }

  pub fn with_max_detections(mut self, max_detections: Option<usize>) -> Self {
    self.max_detections = max_detections;
    self
  }

  pub fn obj_thresh(&self) -> f32 {
    self.obj_thresh
  }

  pub fn nms_thresh(&self) -> f32 {
    self.nms_thresh
  }

  pub fn input_size(&self) -> InputSize {
    self.input_size
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  /// 每个位置的通道数：4 (框) + 1 (目标置信度) + 类别数
  pub fn channels(&self) -> usize {
    super::CLASS_CHANNEL_OFFSET + self.num_classes
  }

  pub fn nms_mode(&self) -> NmsMode {
    self.nms_mode
  }

  pub fn max_detections(&self) -> Option<usize> {
    self.max_detections
  }

  pub fn class_names(&self) -> Option<&[String]> {
    self.class_names.as_deref()
  }

  /// 类别名称，仅用于展示
  pub fn class_name(&self, class_id: u32) -> Option<&str> {
    self
      .class_names
      .as_deref()
      .and_then(|names| names.get(class_id as usize))
      .map(String::as_str)
  }

  pub fn validate(&self) -> Result<(), PostProcessError> {
    let unit = |name: &str, v: f32| {
      if v.is_finite() && (0.0..=1.0).contains(&v) {
        Ok(())
      } else {
        Err(PostProcessError::InvalidConfig(format!(
          "{} 必须位于 [0, 1] 区间, 实际为 {}",
          name, v
        )))
      }
    };
    unit("obj_thresh", self.obj_thresh)?;
    unit("nms_thresh", self.nms_thresh)?;

    if self.input_size.width == 0 || self.input_size.height == 0 {
      return Err(PostProcessError::InvalidConfig(format!(
        "输入尺寸不能为零: {}",
        self.input_size
      )));
    }
    if self.num_classes == 0 {
      return Err(PostProcessError::InvalidConfig(
        "类别数不能为零".to_string(),
      ));
    }
    if let Some(names) = self.class_names.as_deref()
      && names.len() != self.num_classes
    {
      return Err(PostProcessError::InvalidConfig(format!(
        "类别名称数量 {} 与类别数 {} 不一致",
        names.len(),
        self.num_classes
      )));
    }
    Ok(())
  }
}
