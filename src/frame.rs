// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/frame.rs - 像素帧与 NHWC 张量定义
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

use crate::encoder::EncodingError;

pub const RGB_CHANNELS: usize = 3;

/// 8 位 RGB 像素帧，行优先存储
pub type PixelBuffer = image::RgbImage;

/// 模型输入张量，NHWC 排列的 32 位浮点数据
#[derive(Debug, Clone, PartialEq)]
pub struct RgbNhwcTensor {
  side: u32,
  data: Box<[f32]>,
}

impl RgbNhwcTensor {
  pub fn new(side: u32, data: Vec<f32>) -> Result<Self, EncodingError> {
    let expected = Self::expected_len(side);
    if data.len() != expected {
      return Err(EncodingError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      side,
      data: data.into_boxed_slice(),
    })
  }

  pub fn expected_len(side: u32) -> usize {
    RGB_CHANNELS * (side as usize) * (side as usize)
  }

  pub fn height(&self) -> usize {
    self.side as usize
  }

  pub fn width(&self) -> usize {
    self.side as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// [N, H, W, C]
  pub fn shape(&self) -> [usize; 4] {
    [1, self.height(), self.width(), self.channels()]
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// 按 (行, 列) 取出一个像素的三个通道值
  pub fn pixel(&self, row: usize, col: usize) -> Option<[f32; 3]> {
    if row >= self.height() || col >= self.width() {
      return None;
    }
    let idx = (row * self.width() + col) * RGB_CHANNELS;
    Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
  }

  /// 以本机字节序输出原始字节，供推理后端直接拷贝
  pub fn to_ne_bytes(&self) -> Vec<u8> {
    self.data.iter().flat_map(|v| v.to_ne_bytes()).collect()
  }
}

impl AsRef<[f32]> for RgbNhwcTensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_length() {
    let err = RgbNhwcTensor::new(2, vec![0.0; 11]).unwrap_err();
    assert!(matches!(
      err,
      EncodingError::LengthMismatch {
        expected: 12,
        actual: 11
      }
    ));
  }

  #[test]
  fn pixel_lookup_is_row_major() {
    let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
    let tensor = RgbNhwcTensor::new(2, data).unwrap();
    assert_eq!(tensor.shape(), [1, 2, 2, 3]);
    assert_eq!(tensor.pixel(0, 1), Some([3.0, 4.0, 5.0]));
    assert_eq!(tensor.pixel(1, 0), Some([6.0, 7.0, 8.0]));
    assert_eq!(tensor.pixel(2, 0), None);
  }

  #[test]
  fn native_bytes_cover_every_value() {
    let tensor = RgbNhwcTensor::new(1, vec![1.0, 0.5, 0.0]).unwrap();
    let bytes = tensor.to_ne_bytes();
    assert_eq!(bytes.len(), 12);
    assert_eq!(&bytes[4..8], &0.5f32.to_ne_bytes());
  }
}
