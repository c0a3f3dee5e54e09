// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Parser;
use url::Url;

use jianshi::{
  model::COCO_CLASSES,
  output::OutputFormat,
  postprocess::{InputSize, NmsMode, PostProcessConfig},
};

/// Jianshi 检测后处理
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型输出来源，例如 replay:///path/outputs.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入图像，例如 image:///path/bus.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出格式
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  pub format: OutputFormat,

  /// 重复推理次数，大于 1 时输出平均耗时
  #[arg(long, default_value_t = 1, value_name = "COUNT")]
  pub repeat: usize,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.25, value_name = "THRESHOLD")]
  pub obj_thresh: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.45, value_name = "THRESHOLD")]
  pub nms_thresh: f32,

  /// 模型输入尺寸，WxH 或单个边长
  #[arg(long, default_value = "640x640", value_name = "SIZE")]
  pub input_size: InputSize,

  /// 类别数量
  #[arg(long, default_value_t = 80, value_name = "COUNT")]
  pub num_classes: usize,

  /// 按类别分别做 NMS
  #[arg(long)]
  pub per_class_nms: bool,

  /// 最多保留的检测数量
  #[arg(long, value_name = "COUNT")]
  pub max_detections: Option<usize>,
}

impl Args {
  /// 类别数为 80 时沿用 COCO 名称
  pub fn class_names(&self) -> Option<&'static [&'static str]> {
    (self.num_classes == COCO_CLASSES.len()).then_some(&COCO_CLASSES[..])
  }

  pub fn post_process_config(&self) -> PostProcessConfig {
    let config = PostProcessConfig::default()
      .with_obj_thresh(self.obj_thresh)
      .with_nms_thresh(self.nms_thresh)
      .with_input_size(self.input_size)
      .with_num_classes(self.num_classes)
      .with_nms_mode(if self.per_class_nms {
        NmsMode::PerClass
      } else {
        NmsMode::ClassAgnostic
      })
      .with_max_detections(self.max_detections);
    match self.class_names() {
      Some(names) => config.with_class_names(names.iter().copied()),
      None => config,
    }
  }
}
