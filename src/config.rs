// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/config.rs - 模型与流水线配置
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

use std::str::FromStr;

use image::imageops::FilterType;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::frame::RGB_CHANNELS;

const DEFAULT_INPUT_SIZE: u32 = 224;
const DEFAULT_PIXEL_MEAN: f32 = 0.0;
const DEFAULT_PIXEL_SCALE: f32 = 255.0;
const DEFAULT_THREADS: usize = 6;
const DEFAULT_ROI_SIZE: u32 = 400;
const DEFAULT_DECISION_THRESHOLD: f32 = 0.4;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置项 {key} 的值无效: {value}")]
  InvalidValue { key: String, value: String },
}

impl ConfigError {
  pub fn invalid(key: &str, value: &str) -> Self {
    ConfigError::InvalidValue {
      key: key.to_string(),
      value: value.to_string(),
    }
  }
}

/// 推理加速器偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Accelerator {
  /// 只使用 CPU
  None,
  /// 优先使用加速器，不可用时回退到 CPU
  #[default]
  Gpu,
}

impl FromStr for Accelerator {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "none" | "cpu" => Ok(Accelerator::None),
      "gpu" => Ok(Accelerator::Gpu),
      _ => Err(ConfigError::invalid("accelerator", s)),
    }
  }
}

/// 推理后端选项，只影响性能
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
  pub threads: usize,
  pub accelerator: Accelerator,
}

impl Default for BackendOptions {
  fn default() -> Self {
    Self {
      threads: DEFAULT_THREADS,
      accelerator: Accelerator::default(),
    }
  }
}

/// 模型输入约定，构造流水线时确定，之后只读
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
  input_size: u32,
  mean: f32,
  scale: f32,
  filter: FilterType,
  backend: BackendOptions,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      input_size: DEFAULT_INPUT_SIZE,
      mean: DEFAULT_PIXEL_MEAN,
      scale: DEFAULT_PIXEL_SCALE,
      // 与原始的非滤波缩放一致
      filter: FilterType::Nearest,
      backend: BackendOptions::default(),
    }
  }
}

impl ModelConfig {
  pub fn new(input_size: u32) -> Result<Self, ConfigError> {
    Self::default().input_size(input_size)
  }

  pub fn input_size(mut self, input_size: u32) -> Result<Self, ConfigError> {
    if input_size == 0 {
      return Err(ConfigError::invalid("input_size", "0"));
    }
    self.input_size = input_size;
    Ok(self)
  }

  pub fn normalization(mut self, mean: f32, scale: f32) -> Result<Self, ConfigError> {
    if !mean.is_finite() {
      return Err(ConfigError::invalid("mean", &mean.to_string()));
    }
    if !scale.is_finite() || scale == 0.0 {
      return Err(ConfigError::invalid("scale", &scale.to_string()));
    }
    self.mean = mean;
    self.scale = scale;
    Ok(self)
  }

  pub fn filter(mut self, filter: FilterType) -> Self {
    self.filter = filter;
    self
  }

  pub fn backend(mut self, backend: BackendOptions) -> Self {
    self.backend = backend;
    self
  }

  /// 从模型 URL 的查询参数覆盖默认值，例如
  /// `rknn:///models/lesion.rknn?input_size=224&threads=4&accelerator=none`。
  /// 不属于模型配置的参数（如 offset、length）留给模型加载器处理。
  pub fn from_query(url: &Url) -> Result<Self, ConfigError> {
    let mut config = Self::default();
    let (mut mean, mut scale) = (config.mean, config.scale);

    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "input_size" => {
          let size = value
            .parse()
            .map_err(|_| ConfigError::invalid("input_size", &value))?;
          config = config.input_size(size)?;
        }
        "mean" => {
          mean = value.parse().map_err(|_| ConfigError::invalid("mean", &value))?;
        }
        "scale" => {
          scale = value
            .parse()
            .map_err(|_| ConfigError::invalid("scale", &value))?;
        }
        "filter" => config.filter = parse_filter(&value)?,
        "threads" => {
          let threads: usize = value
            .parse()
            .map_err(|_| ConfigError::invalid("threads", &value))?;
          if threads == 0 {
            return Err(ConfigError::invalid("threads", &value));
          }
          config.backend.threads = threads;
        }
        "accelerator" => config.backend.accelerator = value.parse()?,
        other => debug!("模型配置忽略查询参数: {}", other),
      }
    }

    config.normalization(mean, scale)
  }

  pub fn tensor_side(&self) -> u32 {
    self.input_size
  }

  pub const fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn mean(&self) -> f32 {
    self.mean
  }

  pub fn scale(&self) -> f32 {
    self.scale
  }

  pub fn resize_filter(&self) -> FilterType {
    self.filter
  }

  pub fn backend_options(&self) -> BackendOptions {
    self.backend
  }

  pub fn tensor_len(&self) -> usize {
    self.channels() * (self.input_size as usize) * (self.input_size as usize)
  }
}

fn parse_filter(value: &str) -> Result<FilterType, ConfigError> {
  match value.to_ascii_lowercase().as_str() {
    "nearest" => Ok(FilterType::Nearest),
    "triangle" | "bilinear" => Ok(FilterType::Triangle),
    "catmullrom" => Ok(FilterType::CatmullRom),
    "gaussian" => Ok(FilterType::Gaussian),
    "lanczos3" => Ok(FilterType::Lanczos3),
    _ => Err(ConfigError::invalid("filter", value)),
  }
}

/// 感兴趣区域的几何参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryConfig {
  pub roi_size: u32,
}

impl Default for GeometryConfig {
  fn default() -> Self {
    Self {
      roi_size: DEFAULT_ROI_SIZE,
    }
  }
}

/// 判定阈值：得分严格大于阈值即判为恶性
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdConfig {
  pub decision_threshold: f32,
}

impl Default for ThresholdConfig {
  fn default() -> Self {
    Self {
      decision_threshold: DEFAULT_DECISION_THRESHOLD,
    }
  }
}
