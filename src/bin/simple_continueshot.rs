// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/bin/simple_continueshot.rs - 连续分类
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;

use jianzhen::{
  FromUrl,
  args::CommonArgs,
  input::InputWrapper,
  model::RknnClassifierBuilder,
  output::OutputWrapper,
  pipeline::ClassificationPipeline,
  task::{ContinuousTask, Task},
};

/// Jianzhen 连续分类
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub common: CommonArgs,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  args.common.log();

  let builder = RknnClassifierBuilder::from_url(&args.common.model)?;
  let config = builder.config().clone();
  let pipeline = ClassificationPipeline::new(builder.build()?, config)
    .annotator(args.common.annotator()?);
  let input = InputWrapper::from_url(&args.common.input)?;
  let output = OutputWrapper::from_url(&args.common.output)?;

  ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .run_task(input, pipeline, output)?;

  Ok(())
}
