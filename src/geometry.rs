// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/geometry.rs - 帧方向与感兴趣区域
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

use image::imageops;
use thiserror::Error;
use tracing::debug;

use crate::{config::GeometryConfig, frame::PixelBuffer};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
  #[error("帧尺寸 {width}x{height} 小于感兴趣区域 {roi_size}x{roi_size}")]
  FrameTooSmall {
    width: u32,
    height: u32,
    roi_size: u32,
  },
}

/// 竖屏坐标系下的感兴趣区域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionOfInterest {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl RegionOfInterest {
  /// 在 `frame_width x frame_height` 的帧中居中放置边长为 `size` 的正方形
  pub fn centered(frame_width: u32, frame_height: u32, size: u32) -> Result<Self, GeometryError> {
    if frame_width < size || frame_height < size {
      return Err(GeometryError::FrameTooSmall {
        width: frame_width,
        height: frame_height,
        roi_size: size,
      });
    }

    Ok(Self {
      x: (frame_width - size) / 2,
      y: (frame_height - size) / 2,
      width: size,
      height: size,
    })
  }

  pub fn right(&self) -> u32 {
    self.x + self.width
  }

  pub fn bottom(&self) -> u32 {
    self.y + self.height
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameGeometry {
  config: GeometryConfig,
}

impl FrameGeometry {
  pub fn new(config: GeometryConfig) -> Self {
    Self { config }
  }

  pub fn roi_size(&self) -> u32 {
    self.config.roi_size
  }

  /// 横屏转竖屏：先转置再水平镜像，即顺时针旋转 90 度
  pub fn normalize_orientation(&self, frame: PixelBuffer) -> PixelBuffer {
    let portrait = imageops::rotate90(&frame);
    debug!(
      "方向归一化: {}x{} -> {}x{}",
      frame.width(),
      frame.height(),
      portrait.width(),
      portrait.height()
    );
    portrait
  }

  /// 裁剪居中的感兴趣区域，输入帧不会被修改
  pub fn extract_roi(
    &self,
    portrait: &PixelBuffer,
  ) -> Result<(PixelBuffer, RegionOfInterest), GeometryError> {
    let roi = RegionOfInterest::centered(portrait.width(), portrait.height(), self.roi_size())?;
    let cropped = imageops::crop_imm(portrait, roi.x, roi.y, roi.width, roi.height).to_image();
    debug!("裁剪感兴趣区域: {:?}", roi);
    Ok((cropped, roi))
  }

  /// 竖屏转回横屏：先转置再垂直镜像，是 `normalize_orientation` 的精确逆变换
  pub fn restore_orientation(&self, portrait: PixelBuffer) -> PixelBuffer {
    imageops::rotate270(&portrait)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageBuffer, Rgb};

  fn gradient(width: u32, height: u32) -> PixelBuffer {
    ImageBuffer::from_fn(width, height, |x, y| {
      Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
  }

  #[test]
  fn normalize_turns_landscape_into_portrait() {
    let geometry = FrameGeometry::default();
    let frame = gradient(8, 6);
    let corner = *frame.get_pixel(0, 0);
    let portrait = geometry.normalize_orientation(frame);
    assert_eq!(portrait.dimensions(), (6, 8));
    // 转置加水平镜像后，原左上角落到右上角
    assert_eq!(*portrait.get_pixel(5, 0), corner);
  }

  #[test]
  fn orientation_round_trip_is_pixel_identical() {
    let geometry = FrameGeometry::default();
    let frame = gradient(37, 21);
    let restored = geometry.restore_orientation(geometry.normalize_orientation(frame.clone()));
    assert_eq!(restored, frame);
  }

  #[test]
  fn roi_is_centered() {
    let geometry = FrameGeometry::default();
    let portrait = gradient(600, 800);
    let (cropped, roi) = geometry.extract_roi(&portrait).unwrap();
    assert_eq!(
      roi,
      RegionOfInterest {
        x: 100,
        y: 200,
        width: 400,
        height: 400
      }
    );
    assert_eq!(cropped.dimensions(), (400, 400));
    assert_eq!(cropped.get_pixel(0, 0), portrait.get_pixel(100, 200));
    assert_eq!(cropped.get_pixel(399, 399), portrait.get_pixel(499, 599));
  }

  #[test]
  fn odd_margins_round_down() {
    let roi = RegionOfInterest::centered(401, 403, 400).unwrap();
    assert_eq!((roi.x, roi.y), (0, 1));
    assert_eq!((roi.right(), roi.bottom()), (400, 401));
  }

  #[test]
  fn undersized_frame_is_rejected() {
    let geometry = FrameGeometry::default();
    let portrait = gradient(399, 500);
    let err = geometry.extract_roi(&portrait).unwrap_err();
    assert_eq!(
      err,
      GeometryError::FrameTooSmall {
        width: 399,
        height: 500,
        roi_size: 400
      }
    );
  }

  #[test]
  fn roi_size_is_configurable() {
    let geometry = FrameGeometry::new(GeometryConfig { roi_size: 4 });
    let (cropped, roi) = geometry.extract_roi(&gradient(6, 10)).unwrap();
    assert_eq!((roi.x, roi.y), (1, 3));
    assert_eq!(cropped.dimensions(), (4, 4));
  }
}
