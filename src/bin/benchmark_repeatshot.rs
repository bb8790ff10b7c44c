// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复分类测速
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

use anyhow::Result;
use clap::Parser;

use jianzhen::{
  FromUrl,
  args::CommonArgs,
  input::InputWrapper,
  model::RknnClassifierBuilder,
  output::OutputWrapper,
  pipeline::ClassificationPipeline,
  task::{RepeatShotTask, Task},
};
use tracing::info;

/// Jianzhen 重复分类测速
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub common: CommonArgs,
  /// 重复次数
  #[arg(long, default_value = "1000", value_name = "TIMES")]
  pub times: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  args.common.log();
  info!("重复次数: {}", args.times);

  let builder = RknnClassifierBuilder::from_url(&args.common.model)?;
  let config = builder.config().clone();
  let pipeline = ClassificationPipeline::new(builder.build()?, config)
    .annotator(args.common.annotator()?);
  let input = InputWrapper::from_url(&args.common.input)?;
  let output = OutputWrapper::from_url(&args.common.output)?;

  RepeatShotTask::default()
    .with_times(args.times)
    .run_task(input, pipeline, output)?;

  Ok(())
}
