// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/pipeline.rs - 分类流水线
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

use std::{fmt, time::Instant};

use image::{Rgb, imageops};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  annotate::Annotator,
  config::{GeometryConfig, ModelConfig, ThresholdConfig},
  encoder::{EncodingError, TensorEncoder},
  frame::{PixelBuffer, RgbNhwcTensor},
  geometry::{FrameGeometry, GeometryError, RegionOfInterest},
  model::{InferenceError, Model},
};

const MALIGNANT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BENIGN_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

#[derive(Error, Debug)]
pub enum ClassifyError {
  #[error("几何错误: {0}")]
  Geometry(#[from] GeometryError),
  #[error("编码错误: {0}")]
  Encoding(#[from] EncodingError),
  #[error("推理错误: {0}")]
  Inference(#[from] InferenceError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Benign,
  Malignant,
}

impl Verdict {
  /// 得分严格大于阈值才判为恶性
  pub fn from_score(score: f32, threshold: f32) -> Self {
    if score > threshold {
      Verdict::Malignant
    } else {
      Verdict::Benign
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Verdict::Benign => "Benign",
      Verdict::Malignant => "Malignant",
    }
  }

  pub fn label(&self) -> String {
    format!("{} is detected", self.name())
  }

  pub fn color(&self) -> Rgb<u8> {
    match self {
      Verdict::Benign => BENIGN_COLOR,
      Verdict::Malignant => MALIGNANT_COLOR,
    }
  }
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
  pub score: f32,
  pub verdict: Verdict,
  pub threshold: f32,
}

/// 恢复为原始方向并带有标注的输出帧
#[derive(Debug, Clone)]
pub struct AnnotatedFrame {
  pub image: PixelBuffer,
  pub result: ClassificationResult,
  /// 竖屏坐标下的感兴趣区域
  pub roi: RegionOfInterest,
  pub label: String,
  /// 竖屏坐标下的标签起点
  pub label_origin: (i32, i32),
}

pub struct ClassificationPipeline<M> {
  model: M,
  config: ModelConfig,
  geometry: FrameGeometry,
  threshold: ThresholdConfig,
  annotator: Annotator,
}

impl<M> ClassificationPipeline<M>
where
  M: Model<Input = RgbNhwcTensor, Output = f32>,
  M::Error: std::error::Error + Send + Sync + 'static,
{
  pub fn new(model: M, config: ModelConfig) -> Self {
    Self {
      model,
      config,
      geometry: FrameGeometry::default(),
      threshold: ThresholdConfig::default(),
      annotator: Annotator::default(),
    }
  }

  pub fn geometry(mut self, geometry: GeometryConfig) -> Self {
    self.geometry = FrameGeometry::new(geometry);
    self
  }

  pub fn threshold(mut self, threshold: ThresholdConfig) -> Self {
    self.threshold = threshold;
    self
  }

  pub fn annotator(mut self, annotator: Annotator) -> Self {
    self.annotator = annotator;
    self
  }

  pub fn config(&self) -> &ModelConfig {
    &self.config
  }

  /// 把模型得分转换为判定结果
  pub fn decide(&self, score: f32) -> Result<ClassificationResult, InferenceError> {
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
      return Err(InferenceError::InvalidScore(score));
    }

    let threshold = self.threshold.decision_threshold;
    Ok(ClassificationResult {
      score,
      verdict: Verdict::from_score(score, threshold),
      threshold,
    })
  }

  /// 对单帧执行完整流程，任何一步失败都会终止本次调用
  pub fn classify(&self, frame: PixelBuffer) -> Result<AnnotatedFrame, ClassifyError> {
    let now = Instant::now();
    let portrait = self.geometry.normalize_orientation(frame);
    let (cropped, roi) = self.geometry.extract_roi(&portrait)?;

    let side = self.config.tensor_side();
    let resized = imageops::resize(&cropped, side, side, self.config.resize_filter());
    let tensor = TensorEncoder::encode(&resized, &self.config)?;
    debug!("预处理完成，耗时: {:.2?}", now.elapsed());

    let now = Instant::now();
    let score = self
      .model
      .infer(&tensor)
      .map_err(InferenceError::backend)?;
    debug!("推理完成，耗时: {:.2?}", now.elapsed());

    let result = self.decide(score)?;
    info!(
      "判定结果: {} (得分 {:.4}, 阈值 {})",
      result.verdict, result.score, result.threshold
    );

    let label = result.verdict.label();
    let label_origin = self.annotator.label_origin(&roi);
    let annotated = self
      .annotator
      .draw(portrait, &roi, &label, result.verdict.color());

    Ok(AnnotatedFrame {
      image: self.geometry.restore_orientation(annotated),
      result,
      roi,
      label,
      label_origin,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::ImageBuffer;

  struct Fixed(f32);

  impl Model for Fixed {
    type Input = RgbNhwcTensor;
    type Output = f32;
    type Error = InferenceError;

    fn infer(&self, _input: &RgbNhwcTensor) -> Result<f32, InferenceError> {
      Ok(self.0)
    }
  }

  fn pipeline(score: f32) -> ClassificationPipeline<Fixed> {
    ClassificationPipeline::new(Fixed(score), ModelConfig::new(8).unwrap())
  }

  #[test]
  fn decision_boundary_is_strict() {
    let pipeline = pipeline(0.0);
    assert_eq!(pipeline.decide(0.4).unwrap().verdict, Verdict::Benign);
    assert_eq!(pipeline.decide(0.40001).unwrap().verdict, Verdict::Malignant);
    assert_eq!(pipeline.decide(0.0).unwrap().verdict, Verdict::Benign);
    assert_eq!(pipeline.decide(1.0).unwrap().verdict, Verdict::Malignant);
  }

  #[test]
  fn threshold_can_be_substituted() {
    let pipeline = pipeline(0.0).threshold(ThresholdConfig {
      decision_threshold: 0.8,
    });
    let result = pipeline.decide(0.5).unwrap();
    assert_eq!(result.verdict, Verdict::Benign);
    assert_eq!(result.threshold, 0.8);
  }

  #[test]
  fn invalid_scores_are_rejected() {
    let pipeline = pipeline(0.0);
    for score in [f32::NAN, f32::INFINITY, -0.1, 1.5] {
      assert!(matches!(
        pipeline.decide(score),
        Err(InferenceError::InvalidScore(_))
      ));
    }
  }

  #[test]
  fn labels_and_colors() {
    assert_eq!(Verdict::Benign.label(), "Benign is detected");
    assert_eq!(Verdict::Malignant.label(), "Malignant is detected");
    assert_eq!(Verdict::Benign.color(), Rgb([0, 255, 0]));
    assert_eq!(Verdict::Malignant.color(), Rgb([255, 0, 0]));
  }

  #[test]
  fn small_frame_aborts_the_call() {
    // 横屏 500x399 旋转后为 399x500
    let frame = ImageBuffer::from_pixel(500, 399, Rgb([128u8, 128, 128]));
    let err = pipeline(0.9).classify(frame).unwrap_err();
    assert!(matches!(err, ClassifyError::Geometry(_)));
  }

  #[test]
  fn nan_score_aborts_the_call() {
    let frame = ImageBuffer::from_pixel(800, 600, Rgb([128u8, 128, 128]));
    let err = pipeline(f32::NAN).classify(frame).unwrap_err();
    assert!(matches!(
      err,
      ClassifyError::Inference(InferenceError::InvalidScore(_))
    ));
  }
}
