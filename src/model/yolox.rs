// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/model/yolox.rs - YOLOX 检测器
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

use image::{Rgb, RgbImage};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
  frame::RgbNhwcFrame,
  model::{DetectResult, Model},
  postprocess::{LETTERBOX_FILL, Letterboxed, PostProcessConfig, PostProcessError, letterbox, post_process},
  runtime::Runtime,
};

#[derive(Error, Debug)]
pub enum YoloxError {
  /// 推理后端失败，与“没有检测到目标”区分
  #[error("推理失败: {0}")]
  Upstream(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
  #[error("推理没有返回任何输出张量")]
  NoOutputs,
  #[error("后处理错误: {0}")]
  PostProcess(#[from] PostProcessError),
}

/// letterbox → 推理 → 后处理
pub struct Yolox<R> {
  runtime: R,
  config: PostProcessConfig,
  fill: Rgb<u8>,
}

impl<R: Runtime> Yolox<R> {
  pub fn new(runtime: R, config: PostProcessConfig) -> Result<Self, YoloxError> {
    config.validate()?;
    Ok(Self {
      runtime,
      config,
      fill: LETTERBOX_FILL,
    })
  }

  pub fn with_fill(mut self, fill: Rgb<u8>) -> Self {
    self.fill = fill;
    self
  }

  pub fn config(&self) -> &PostProcessConfig {
    &self.config
  }

  pub fn runtime(&self) -> &R {
    &self.runtime
  }
}

impl<R: Runtime> Model for Yolox<R> {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = YoloxError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (orig_width, orig_height) = input.dimensions();
    let Letterboxed { image, transform } = letterbox(input, self.config.input_size(), self.fill)?;

    debug!("执行模型推理");
    let frame = RgbNhwcFrame::from(image);
    let maps = self.runtime.run(&frame).map_err(|e| {
      error!("推理失败: {}", e);
      YoloxError::Upstream(Box::new(e))
    })?;
    if maps.is_empty() {
      error!("推理没有返回任何输出张量");
      return Err(YoloxError::NoOutputs);
    }
    debug!(
      "模型输出形状: {:?}",
      maps.iter().map(|m| m.shape()).collect::<Vec<_>>()
    );

    Ok(post_process(
      &maps,
      &self.config,
      &transform,
      orig_width,
      orig_height,
    )?)
  }
}
