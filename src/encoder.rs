// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/encoder.rs - 像素帧到模型张量的编码
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

use thiserror::Error;

use crate::{
  config::ModelConfig,
  frame::{PixelBuffer, RgbNhwcTensor},
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
  #[error("像素帧尺寸 {width}x{height} 与模型输入 {expected}x{expected} 不一致")]
  SizeMismatch {
    width: u32,
    height: u32,
    expected: u32,
  },
  #[error("张量长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

pub struct TensorEncoder;

impl TensorEncoder {
  /// 按行优先顺序逐像素输出 R、G、B 三个归一化值。
  /// 这个顺序就是与推理后端约定的输入布局。
  pub fn encode(pixels: &PixelBuffer, config: &ModelConfig) -> Result<RgbNhwcTensor, EncodingError> {
    let side = config.tensor_side();
    let (width, height) = pixels.dimensions();
    if width != side || height != side {
      return Err(EncodingError::SizeMismatch {
        width,
        height,
        expected: side,
      });
    }

    let (mean, scale) = (config.mean(), config.scale());
    let mut data = Vec::with_capacity(config.tensor_len());
    for row in 0..height {
      for col in 0..width {
        let pixel = pixels.get_pixel(col, row);
        for channel in pixel.0 {
          data.push((channel as f32 - mean) / scale);
        }
      }
    }

    RgbNhwcTensor::new(side, data)
  }
}
