// 该文件是 Jianshi （鉴识） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use jianshi::{
  FromUrl,
  input::ImageFileInput,
  model::Yolox,
  output::ConsoleOutput,
  runtime::ReplayRuntimeBuilder,
  task::{OneShotTask, RepeatShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = args::Args::parse();

  info!("模型输出来源: {}", args.model);
  info!("输入来源: {}", args.input);
  info!(
    "阈值: obj {} / nms {}, 输入尺寸 {}",
    args.obj_thresh, args.nms_thresh, args.input_size
  );

  let input = ImageFileInput::from_url(&args.input)?;
  let runtime = ReplayRuntimeBuilder::from_url(&args.model)?.build()?;
  let model = Yolox::new(runtime, args.post_process_config())?;

  let mut output = ConsoleOutput::new(args.format);
  if let Some(names) = args.class_names() {
    output = output.with_class_names(names.iter().copied());
  }

  if args.repeat > 1 {
    RepeatShotTask::new(args.repeat).run_task(input, model, output)?;
  } else {
    OneShotTask.run_task(input, model, output)?;
  }

  Ok(())
}
