// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/runtime/replay.rs - 回放已保存的模型输出
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  input::AsNhwcFrame,
  postprocess::{FeatureMap, InputSize, PostProcessError},
  runtime::Runtime,
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("第 {index} 个输出张量无效: {source}")]
  InvalidTensor {
    index: usize,
    #[source]
    source: PostProcessError,
  },
  #[error("输入尺寸不匹配: 期望 {expected}, 实际 {actual}")]
  InputMismatch {
    expected: InputSize,
    actual: InputSize,
  },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 保存下来的一个输出张量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplayTensor {
  Float {
    shape: Vec<usize>,
    data: Vec<f32>,
  },
  Quantized {
    shape: Vec<usize>,
    qdata: Vec<i8>,
    zero_point: i32,
    scale: f32,
  },
}

impl ReplayTensor {
  fn to_feature_map(&self) -> Result<FeatureMap, PostProcessError> {
    match self {
      ReplayTensor::Float { shape, data } => FeatureMap::new(shape, data.clone()),
      ReplayTensor::Quantized {
        shape,
        qdata,
        zero_point,
        scale,
      } => FeatureMap::from_quantized(shape, qdata, *zero_point, *scale),
    }
  }
}

/// 回放文件的内容：一次推理的全部输出
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayDump {
  /// 记录时模型的输入尺寸，存在时会校验输入帧
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub input_size: Option<InputSize>,
  pub outputs: Vec<ReplayTensor>,
}

/// 每次推理都返回同一组输出的后端，用于离线调试后处理
#[derive(Debug, Clone)]
pub struct ReplayRuntime {
  input_size: Option<InputSize>,
  maps: Vec<FeatureMap>,
}

impl ReplayRuntime {
  pub fn from_dump(dump: &ReplayDump) -> Result<Self, ReplayError> {
    let maps = dump
      .outputs
      .iter()
      .enumerate()
      .map(|(index, tensor)| {
        tensor
          .to_feature_map()
          .map_err(|source| ReplayError::InvalidTensor { index, source })
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self {
      input_size: dump.input_size,
      maps,
    })
  }

  pub fn from_maps(maps: Vec<FeatureMap>) -> Self {
    Self {
      input_size: None,
      maps,
    }
  }

  pub fn num_outputs(&self) -> usize {
    self.maps.len()
  }
}

impl Runtime for ReplayRuntime {
  type Error = ReplayError;

  fn run(&self, input: &RgbNhwcFrame) -> Result<Vec<FeatureMap>, Self::Error> {
    if let Some(expected) = self.input_size {
      let actual = InputSize::new(input.width() as u32, input.height() as u32);
      if actual != expected {
        error!("回放输入尺寸不匹配: 期望 {}, 实际 {}", expected, actual);
        return Err(ReplayError::InputMismatch { expected, actual });
      }
    }
    debug!(
      "回放 {} 个输出, 输入 {} 字节",
      self.maps.len(),
      input.as_nhwc().len()
    );
    Ok(self.maps.clone())
  }
}

pub struct ReplayRuntimeBuilder {
  path: String,
}

impl FromUrlWithScheme for ReplayRuntimeBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayRuntimeBuilder {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(ReplayRuntimeBuilder {
      path: url.path().to_string(),
    })
  }
}

impl ReplayRuntimeBuilder {
  pub fn new(path: impl Into<String>) -> Self {
    Self { path: path.into() }
  }

  pub fn build(self) -> Result<ReplayRuntime, ReplayError> {
    info!("加载回放文件: {}", self.path);
    let raw = std::fs::read(&self.path)?;
    debug!(
      "回放文件大小: {:.2} MB",
      raw.len() as f64 / (1024.0 * 1024.0)
    );

    let dump: ReplayDump = serde_json::from_slice(&raw)?;
    let runtime = ReplayRuntime::from_dump(&dump)?;
    info!("回放文件加载完成, 输出数量: {}", runtime.num_outputs());
    for (i, map) in runtime.maps.iter().enumerate() {
      debug!("输出 {}: 形状 {:?}", i, map.shape());
    }
    Ok(runtime)
  }
}
