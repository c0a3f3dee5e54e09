// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/runtime.rs - 推理后端
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

//! 推理后端接口。
//!
//! 加载与初始化由各后端的 builder 完成（`from_url(..)?.build()?`），
//! 释放由 `Drop` 完成；流水线只关心 [`Runtime::run`] 返回的原始张量。

use crate::{frame::RgbNhwcFrame, postprocess::FeatureMap};

pub trait Runtime {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 执行一次推理，按尺度从大到小返回原始特征图
  fn run(&self, input: &RgbNhwcFrame) -> Result<Vec<FeatureMap>, Self::Error>;
}

#[cfg(feature = "replay_runtime")]
mod replay;
#[cfg(feature = "replay_runtime")]
pub use self::replay::{ReplayDump, ReplayError, ReplayRuntime, ReplayRuntimeBuilder, ReplayTensor};
