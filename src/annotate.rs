// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/annotate.rs - 判定结果标注
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::Rgb;
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use tracing::debug;

use crate::{frame::PixelBuffer, geometry::RegionOfInterest};

// 内置标签字体
const DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 24.0;
const LABEL_OFFSET_X: i32 = 30;
const LABEL_Y: i32 = 80;
const STROKE_WIDTH: u32 = 2;

/// 标注样式，坐标均为竖屏坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatorStyle {
  pub font_size: f32,
  /// 标签相对感兴趣区域左边界的水平偏移
  pub label_offset_x: i32,
  /// 标签基线的绝对纵坐标
  pub label_y: i32,
  pub stroke_width: u32,
}

impl Default for AnnotatorStyle {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_offset_x: LABEL_OFFSET_X,
      label_y: LABEL_Y,
      stroke_width: STROKE_WIDTH,
    }
  }
}

#[derive(Clone)]
pub struct Annotator {
  style: AnnotatorStyle,
  font: FontArc,
}

impl Default for Annotator {
  fn default() -> Self {
    Self::new(AnnotatorStyle::default())
  }
}

impl Annotator {
  pub fn new(style: AnnotatorStyle) -> Self {
    let font = FontArc::try_from_slice(DEFAULT_FONT).expect("无法加载内置字体");
    Self { style, font }
  }

  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = font;
    self
  }

  /// 从 TrueType/OpenType 字体文件加载标签字体
  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontArc::try_from_vec(data)
      .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    debug!("已加载标签字体: {}", path.as_ref().display());
    Ok(self.with_font(font))
  }

  pub fn style(&self) -> &AnnotatorStyle {
    &self.style
  }

  /// 标签文字在竖屏坐标中的左下基线点
  pub fn label_origin(&self, roi: &RegionOfInterest) -> (i32, i32) {
    (roi.x as i32 + self.style.label_offset_x, self.style.label_y)
  }

  /// 在帧上绘制一段文字和感兴趣区域的矩形边框
  pub fn draw(
    &self,
    mut frame: PixelBuffer,
    roi: &RegionOfInterest,
    text: &str,
    color: Rgb<u8>,
  ) -> PixelBuffer {
    // 边框向内加粗
    for inset in 0..self.style.stroke_width {
      let width = roi.width.saturating_sub(2 * inset);
      let height = roi.height.saturating_sub(2 * inset);
      if width == 0 || height == 0 {
        break;
      }
      let rect = Rect::at((roi.x + inset) as i32, (roi.y + inset) as i32).of_size(width, height);
      draw_hollow_rect_mut(&mut frame, rect, color);
    }

    // draw_text_mut 以字形框左上角定位，这里换算到基线
    let (x, baseline) = self.label_origin(roi);
    let scale = PxScale::from(self.style.font_size);
    let ascent = self.font.as_scaled(scale).ascent().round() as i32;
    draw_text_mut(&mut frame, color, x, baseline - ascent, scale, &self.font, text);

    frame
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::ImageBuffer;

  const GRAY: Rgb<u8> = Rgb([128, 128, 128]);
  const RED: Rgb<u8> = Rgb([255, 0, 0]);

  fn roi() -> RegionOfInterest {
    RegionOfInterest {
      x: 10,
      y: 20,
      width: 40,
      height: 30,
    }
  }

  #[test]
  fn outline_has_constant_stroke() {
    let frame = ImageBuffer::from_pixel(60, 60, GRAY);
    let frame = Annotator::default().draw(frame, &roi(), "Malignant is detected", RED);

    // 外边和内一像素都被描边
    assert_eq!(*frame.get_pixel(10, 35), RED);
    assert_eq!(*frame.get_pixel(11, 35), RED);
    assert_eq!(*frame.get_pixel(12, 35), GRAY);
    assert_eq!(*frame.get_pixel(30, 20), RED);
    assert_eq!(*frame.get_pixel(30, 21), RED);
    assert_eq!(*frame.get_pixel(49, 49), RED);
    assert_eq!(*frame.get_pixel(48, 48), RED);
    // 区域外和区域中心不变
    assert_eq!(*frame.get_pixel(9, 35), GRAY);
    assert_eq!(*frame.get_pixel(50, 35), GRAY);
    assert_eq!(*frame.get_pixel(30, 35), GRAY);
  }

  #[test]
  fn label_origin_follows_roi() {
    let annotator = Annotator::default();
    assert_eq!(annotator.label_origin(&roi()), (40, 80));

    let style = AnnotatorStyle {
      label_offset_x: 5,
      label_y: 7,
      ..AnnotatorStyle::default()
    };
    assert_eq!(Annotator::new(style).label_origin(&roi()), (15, 7));
  }

  #[test]
  fn label_sits_on_baseline() {
    let frame = ImageBuffer::from_pixel(300, 120, GRAY);
    let roi = RegionOfInterest {
      x: 0,
      y: 100,
      width: 300,
      height: 20,
    };
    let frame = Annotator::default().draw(frame, &roi, "Benign is detected", RED);

    let is_red = |x, y| {
      let Rgb([r, g, _]) = *frame.get_pixel(x, y);
      r > 200 && g < 100
    };
    let red_rows: Vec<u32> = (0..100)
      .filter(|&y| (0..300).any(|x| is_red(x, y)))
      .collect();
    assert!(!red_rows.is_empty());
    // 大写字母顶部在基线上方约一个字高，降部不超过几个像素
    assert!(*red_rows.first().unwrap() >= 80 - 24);
    assert!(*red_rows.first().unwrap() < 80);
    assert!(*red_rows.last().unwrap() <= 80 + 8);
    // 文字从 x = 30 附近开始
    assert!((0..28).all(|x| (0..100).all(|y| *frame.get_pixel(x, y) == GRAY)));
  }

  #[test]
  fn missing_font_file_is_an_error() {
    assert!(
      Annotator::default()
        .with_font_file("/nonexistent/font.ttf")
        .is_err()
    );
  }
}
