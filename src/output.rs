// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/output.rs - 检测结果输出
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

use std::io::Write;

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

use crate::model::{DetectResult, Detection};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 结果的输出格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

/// 把检测结果打印到标准输出
#[derive(Debug, Clone)]
pub struct ConsoleOutput {
  format: OutputFormat,
  class_names: Vec<String>,
}

impl ConsoleOutput {
  pub fn new(format: OutputFormat) -> Self {
    Self {
      format,
      class_names: Vec::new(),
    }
  }

  pub fn with_class_names<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.class_names = names.into_iter().map(Into::into).collect();
    self
  }

  fn class_name(&self, class_id: u32) -> String {
    self
      .class_names
      .get(class_id as usize)
      .cloned()
      .unwrap_or_else(|| format!("class_{}", class_id))
  }

  pub fn write_text<W: Write>(
    &self,
    out: &mut W,
    frame: &RgbImage,
    result: &DetectResult,
  ) -> Result<(), OutputError> {
    writeln!(
      out,
      "图像 {}x{}: 检测到 {} 个对象",
      frame.width(),
      frame.height(),
      result.len()
    )?;
    for (i, det) in result.iter().enumerate() {
      let [x1, y1, x2, y2] = det.bbox;
      writeln!(
        out,
        "{}. {:15} @ ({:4}, {:4}, {:4}, {:4}) 置信度: {:.3}",
        i + 1,
        self.class_name(det.class_id),
        x1,
        y1,
        x2,
        y2,
        det.score
      )?;
    }
    Ok(())
  }

  pub fn write_json<W: Write>(
    &self,
    out: &mut W,
    frame: &RgbImage,
    result: &DetectResult,
  ) -> Result<(), OutputError> {
    #[derive(Serialize)]
    struct Named<'a> {
      #[serde(flatten)]
      detection: &'a Detection,
      name: String,
    }

    #[derive(Serialize)]
    struct Report<'a> {
      width: u32,
      height: u32,
      detections: Vec<Named<'a>>,
    }

    let report = Report {
      width: frame.width(),
      height: frame.height(),
      detections: result
        .iter()
        .map(|detection| Named {
          detection,
          name: self.class_name(detection.class_id),
        })
        .collect(),
    };
    serde_json::to_writer(&mut *out, &report)?;
    writeln!(out)?;
    Ok(())
  }
}

impl Render<RgbImage, DetectResult> for ConsoleOutput {
  type Error = OutputError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    match self.format {
      OutputFormat::Text => self.write_text(&mut lock, frame, result),
      OutputFormat::Json => self.write_json(&mut lock, frame, result),
    }
  }
}
