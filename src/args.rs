// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Args;
use tracing::info;
use url::Url;

use crate::annotate::Annotator;

/// 各个可执行程序共用的参数
#[derive(Args, Debug)]
pub struct CommonArgs {
  /// 模型 URL，例如 rknn:///models/lesion.rknn?input_size=224&threads=6
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源（image:///path/frame.jpg 或 folder:///path/frames）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径（image:///path/out.png 或 folder:///path/records?record）
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 标签文字使用的 TrueType 字体文件，不指定时使用内置字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

impl CommonArgs {
  pub fn log(&self) {
    info!("模型文件路径: {}", self.model);
    info!("输入来源: {}", self.input);
    info!("输出路径: {}", self.output);
  }

  pub fn annotator(&self) -> Result<Annotator, std::io::Error> {
    match &self.font {
      Some(path) => Annotator::default().with_font_file(path),
      None => Ok(Annotator::default()),
    }
  }
}
