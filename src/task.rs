// 该文件是 Jianzhen （鉴真） 项目的一部分。
// src/task.rs - 任务驱动
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

use std::{thread, time::Duration};
use tracing::{info, warn};

use crate::{
  frame::{PixelBuffer, RgbNhwcTensor},
  model::Model,
  output::Render,
  pipeline::ClassificationPipeline,
};

const DEFAULT_REPEAT_TIMES: usize = 1000;
const WARMUP_RUNS: usize = 2;

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    pipeline: ClassificationPipeline<M>,
    output: O,
  ) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = PixelBuffer>,
  M: Model<Input = RgbNhwcTensor, Output = f32, Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    pipeline: ClassificationPipeline<M>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始分类...");
    let now = std::time::Instant::now();
    let annotated = pipeline.classify(frame)?;
    info!("分类完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&annotated)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复分类，统计平均耗时
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self {
      times: DEFAULT_REPEAT_TIMES,
    }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times.max(1);
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = PixelBuffer>,
  M: Model<Input = RgbNhwcTensor, Output = f32, Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    pipeline: ClassificationPipeline<M>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始分类...");
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = std::time::Instant::now();
      let annotated = pipeline.classify(frame.clone())?;
      let elapsed = now.elapsed();
      info!("({})分类完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&annotated)?;
      info!("({})渲染完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    // 样本足够时去掉预热的前几次
    let skip = if times.len() > WARMUP_RUNS { WARMUP_RUNS } else { 0 };
    let measured = &times[skip..];
    warn!(
      "平均分类时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = PixelBuffer>,
  M: Model<Input = RgbNhwcTensor, Output = f32, Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    pipeline: ClassificationPipeline<M>,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    let mut frame_index = 0;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let annotated = pipeline.classify(frame)?;
      let elapsed_a = now.elapsed();
      output.render_result(&annotated)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!("分类完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::{
    config::ModelConfig,
    model::InferenceError,
    pipeline::{AnnotatedFrame, Verdict},
  };
  use image::{ImageBuffer, Rgb};

  struct Fixed(f32);

  impl Model for Fixed {
    type Input = RgbNhwcTensor;
    type Output = f32;
    type Error = InferenceError;

    fn infer(&self, _input: &RgbNhwcTensor) -> Result<f32, InferenceError> {
      Ok(self.0)
    }
  }

  #[derive(Default)]
  struct Collect {
    verdicts: RefCell<Vec<Verdict>>,
  }

  impl Render for &Collect {
    type Error = std::io::Error;

    fn render_result(&self, frame: &AnnotatedFrame) -> Result<(), Self::Error> {
      self.verdicts.borrow_mut().push(frame.result.verdict);
      Ok(())
    }
  }

  fn pipeline(score: f32) -> ClassificationPipeline<Fixed> {
    ClassificationPipeline::new(Fixed(score), ModelConfig::new(16).unwrap())
  }

  fn frames(count: usize) -> impl Iterator<Item = PixelBuffer> {
    (0..count).map(|_| ImageBuffer::from_pixel(640, 480, Rgb([90u8, 90, 90])))
  }

  #[test]
  fn one_shot_renders_first_frame_only() {
    let collect = Collect::default();
    OneShotTask
      .run_task(frames(3), pipeline(0.9), &collect)
      .unwrap();
    assert_eq!(*collect.verdicts.borrow(), vec![Verdict::Malignant]);
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let collect = Collect::default();
    assert!(
      OneShotTask
        .run_task(frames(0), pipeline(0.1), &collect)
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_reuses_the_same_frame() {
    let collect = Collect::default();
    RepeatShotTask::default()
      .with_times(4)
      .run_task(frames(1), pipeline(0.1), &collect)
      .unwrap();
    assert_eq!(collect.verdicts.borrow().len(), 4);
  }

  #[test]
  fn continuous_stops_at_frame_number() {
    let collect = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(frames(5), pipeline(0.1), &collect)
      .unwrap();
    assert_eq!(*collect.verdicts.borrow(), vec![Verdict::Benign; 2]);
  }
}
