// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/model/rknn.rs - RKNN 分类模型后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use rknpu::{Context, InitFlags, TensorFormat, TensorType};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::{Accelerator, ModelConfig},
  frame::RgbNhwcTensor,
  model::{InferenceError, Model, ModelLoadError, ModelSource},
};

const RKNN_NUM_INPUTS: u32 = 1;

/// 单输入、单标量输出的二分类模型
pub struct RknnClassifier {
  context: Context,
  config: ModelConfig,
}

pub struct RknnClassifierBuilder {
  source: ModelSource,
  config: ModelConfig,
  flags: InitFlags,
}

impl FromUrlWithScheme for RknnClassifierBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for RknnClassifierBuilder {
  type Error = ModelLoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelLoadError::PathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(RknnClassifierBuilder {
      source: ModelSource::from_url(url)?,
      config: ModelConfig::from_query(url)?,
      flags: InitFlags::default(),
    })
  }
}

impl RknnClassifierBuilder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn config(&self) -> &ModelConfig {
    &self.config
  }

  pub fn build(self) -> Result<RknnClassifier, ModelLoadError> {
    let model_data = self.source.load()?;

    let options = self.config.backend_options();
    if options.accelerator == Accelerator::None {
      warn!("RKNN 后端只在 NPU 上运行，忽略 accelerator=none");
    }
    // NPU 核心由运行时调度，线程数仅作提示
    debug!("推理线程数提示: {}", options.threads);

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&model_data, self.flags)
      .map_err(|e| ModelLoadError::invalid("无法创建 RKNN 上下文", e))?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(ModelLoadError::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| ModelLoadError::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| ModelLoadError::invalid("无法获取输出数量", e))?;

    if num_inputs != RKNN_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNN_NUM_INPUTS, num_inputs
      );
      return Err(ModelLoadError::Invalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        RKNN_NUM_INPUTS, num_inputs
      )));
    }

    if num_outputs == 0 {
      error!("模型没有输出");
      return Err(ModelLoadError::Invalid("模型没有输出".to_string()));
    }

    debug!("模型输入数量: {}", num_inputs);
    debug!("模型输出数量: {}", num_outputs);
    info!("模型加载完成");

    Ok(RknnClassifier {
      context,
      config: self.config,
    })
  }
}

impl RknnClassifier {
  pub fn config(&self) -> &ModelConfig {
    &self.config
  }
}

fn backend_error(msg: &str, e: impl std::fmt::Display) -> InferenceError {
  InferenceError::Backend(format!("{}: {}", msg, e).into())
}

impl Model for RknnClassifier {
  type Input = RgbNhwcTensor;
  type Output = f32;
  type Error = InferenceError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入: {:?}", input.shape());
    let bytes = input.to_ne_bytes();
    self
      .context
      .set_input(0, bytes.as_slice(), TensorFormat::NHWC, TensorType::Float32)
      .map_err(|e| backend_error("设置输入失败", e))?;

    debug!("执行模型推理");
    self
      .context
      .run()
      .map_err(|e| backend_error("推理失败", e))?;

    let output = self
      .context
      .get_outputs()
      .map_err(|e| backend_error("获取输出失败", e))?;
    let scores = output
      .get_f32(0)
      .map_err(|e| backend_error("读取第 0 个输出失败", e))?;
    debug!("模型输出: {:?}", scores);

    scores.first().copied().ok_or(InferenceError::EmptyOutput)
  }
}
