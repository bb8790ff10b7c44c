// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/model.rs - 模型
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

use std::{
  fs::File,
  io::{Read, Seek, SeekFrom},
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, config::ConfigError};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

impl<M: Model + ?Sized> Model for &M {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

impl<M: Model + ?Sized> Model for Arc<M> {
  type Input = M::Input;
  type Output = M::Output;
  type Error = M::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    (**self).infer(input)
  }
}

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("模型加载错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("模型文件为空: {0}")]
  Empty(String),
  #[error("模型文件长度不足: 期望 {expected} 字节, 实际 {actual} 字节")]
  Truncated { expected: u64, actual: u64 },
  #[error("模型路径错误: {0}")]
  PathError(String),
  #[error("模型配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("模型无效: {0}")]
  Invalid(String),
}

impl ModelLoadError {
  pub fn invalid(msg: &str, e: impl std::fmt::Display) -> Self {
    ModelLoadError::Invalid(format!("{}, 错误: {}", msg, e))
  }
}

#[derive(Error, Debug)]
pub enum InferenceError {
  #[error("推理后端错误: {0}")]
  Backend(Box<dyn std::error::Error + Send + Sync>),
  #[error("模型输出为空")]
  EmptyOutput,
  #[error("模型得分无效: {0}")]
  InvalidScore(f32),
  #[error("推理锁已失效")]
  Poisoned,
}

impl InferenceError {
  /// 包装后端错误；已经是 `InferenceError` 的不再重复包装
  pub fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
    match boxed.downcast::<InferenceError>() {
      Ok(inner) => *inner,
      Err(other) => InferenceError::Backend(other),
    }
  }
}

/// 模型文件位置，可以指向打包文件中的一段字节
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
  path: PathBuf,
  offset: u64,
  length: Option<u64>,
}

impl FromUrl for ModelSource {
  type Error = ModelLoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    let path = url.path();
    if path.is_empty() || path == "/" {
      return Err(ModelLoadError::PathError(format!("URL 中缺少模型路径: {}", url)));
    }

    let mut source = ModelSource::new(path);
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "offset" => {
          source.offset = value
            .parse()
            .map_err(|_| ConfigError::invalid("offset", &value))?;
        }
        "length" => {
          source.length = Some(
            value
              .parse()
              .map_err(|_| ConfigError::invalid("length", &value))?,
          );
        }
        _ => {}
      }
    }
    Ok(source)
  }
}

impl ModelSource {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      offset: 0,
      length: None,
    }
  }

  pub fn range(mut self, offset: u64, length: Option<u64>) -> Self {
    self.offset = offset;
    self.length = length;
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 一次性读入模型字节，之后由后端持有
  pub fn load(&self) -> Result<Vec<u8>, ModelLoadError> {
    info!("加载模型文件: {}", self.path.display());
    let mut file = File::open(&self.path)?;
    let file_len = file.metadata()?.len();

    let available = file_len.saturating_sub(self.offset);
    if self.offset > file_len {
      return Err(ModelLoadError::Truncated {
        expected: self.offset,
        actual: file_len,
      });
    }
    let wanted = match self.length {
      Some(length) if length > available => {
        return Err(ModelLoadError::Truncated {
          expected: self.offset.saturating_add(length),
          actual: file_len,
        });
      }
      Some(length) => length,
      None => available,
    };

    file.seek(SeekFrom::Start(self.offset))?;
    let mut data = Vec::with_capacity(wanted as usize);
    file.take(wanted).read_to_end(&mut data)?;

    if data.is_empty() {
      return Err(ModelLoadError::Empty(self.path.display().to_string()));
    }

    debug!(
      "模型文件大小: {:.2} MB",
      data.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(data)
  }
}

/// 为不支持并发调用的后端加锁，逐个执行推理
pub struct Serialized<M> {
  inner: Mutex<M>,
}

impl<M> Serialized<M> {
  pub fn new(model: M) -> Self {
    Self {
      inner: Mutex::new(model),
    }
  }
}

impl<M> Model for Serialized<M>
where
  M: Model,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  type Input = M::Input;
  type Output = M::Output;
  type Error = InferenceError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let model = self.inner.lock().map_err(|_| InferenceError::Poisoned)?;
    model.infer(input).map_err(InferenceError::backend)
  }
}

#[cfg(feature = "model_rknn")]
mod rknn;
#[cfg(feature = "model_rknn")]
pub use self::rknn::{RknnClassifier, RknnClassifierBuilder};

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  struct Echo;

  impl Model for Echo {
    type Input = f32;
    type Output = f32;
    type Error = InferenceError;

    fn infer(&self, input: &f32) -> Result<f32, InferenceError> {
      if input.is_nan() {
        return Err(InferenceError::InvalidScore(*input));
      }
      Ok(*input)
    }
  }

  fn model_file(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file
  }

  #[test]
  fn loads_whole_file() {
    let file = model_file(b"RKNNMODEL");
    let data = ModelSource::new(file.path()).load().unwrap();
    assert_eq!(data, b"RKNNMODEL");
  }

  #[test]
  fn loads_byte_range() {
    let file = model_file(b"headerRKNNtrailer");
    let data = ModelSource::new(file.path())
      .range(6, Some(4))
      .load()
      .unwrap();
    assert_eq!(data, b"RKNN");
  }

  #[test]
  fn short_file_is_rejected() {
    let file = model_file(b"abc");
    let err = ModelSource::new(file.path())
      .range(1, Some(10))
      .load()
      .unwrap_err();
    assert!(matches!(
      err,
      ModelLoadError::Truncated {
        expected: 11,
        actual: 3
      }
    ));
  }

  #[test]
  fn huge_length_is_rejected() {
    let file = model_file(b"abc");
    let url = Url::parse(&format!(
      "rknn://{}?offset=1&length={}",
      file.path().display(),
      u64::MAX
    ))
    .unwrap();
    let err = ModelSource::from_url(&url).unwrap().load().unwrap_err();
    assert!(matches!(
      err,
      ModelLoadError::Truncated {
        expected: u64::MAX,
        actual: 3
      }
    ));
  }

  #[test]
  fn empty_and_missing_files_fail() {
    let file = model_file(b"");
    assert!(matches!(
      ModelSource::new(file.path()).load(),
      Err(ModelLoadError::Empty(_))
    ));
    assert!(matches!(
      ModelSource::new("/nonexistent/lesion.rknn").load(),
      Err(ModelLoadError::Io(_))
    ));
  }

  #[test]
  fn source_from_url_reads_range() {
    let url = Url::parse("rknn:///models/bundle.bin?offset=128&length=4096&threads=2").unwrap();
    let source = ModelSource::from_url(&url).unwrap();
    assert_eq!(
      source,
      ModelSource::new("/models/bundle.bin").range(128, Some(4096))
    );
  }

  #[test]
  fn serialized_model_keeps_inference_errors_flat() {
    let model = Serialized::new(Echo);
    assert_eq!(model.infer(&0.25).unwrap(), 0.25);
    assert!(matches!(
      model.infer(&f32::NAN),
      Err(InferenceError::InvalidScore(_))
    ));
  }
}
