// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/input/directory_input.rs - 目录图像输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{collections::VecDeque, path::PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use super::read_image_file::read_rgb_image;
use crate::{FromUrl, FromUrlWithScheme, frame::PixelBuffer};

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐张读取目录中的图片，无法解码的文件会被跳过
pub struct DirectoryInput {
  pending: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(url.path())? {
      let path = entry?.path();
      if path.is_file() {
        paths.push(path);
      }
    }
    paths.sort();
    info!("输入目录 {} 中共有 {} 个文件", url.path(), paths.len());

    Ok(DirectoryInput {
      pending: paths.into(),
    })
  }
}

impl Iterator for DirectoryInput {
  type Item = PixelBuffer;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      match read_rgb_image(&path) {
        Ok(image) => {
          debug!("读取图像文件: {}", path.display());
          return Some(image);
        }
        Err(e) => warn!("跳过无法读取的文件 {}: {}", path.display(), e),
      }
    }
    None
  }
}
