// 该文件是 Beifeng （北风） 项目的一部分。
// src/task.rs - 检测任务
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
  fmt::Display,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{
  engine::{InferenceEngine, run_with_retry},
  geometry::CanvasSize,
  output::Render,
  runtime::Detector,
  session::DetectionSession,
};

pub trait Task<I, E, O>: Sized {
  type Error;
  fn run_task(self, input: I, engine: E, output: O) -> Result<(), Self::Error>;
}

/// 在当前线程上完成一帧推理与解码
fn infer_once<E>(
  session: &mut DetectionSession,
  engine: &mut E,
  frame: &E::Input,
  canvas: CanvasSize,
) where
  E: InferenceEngine,
  E::Error: Display,
{
  let config = session.config();
  let threshold = config.confidence_threshold;
  let (attempts, delay) = (config.retry_attempts, config.retry_delay);
  match run_with_retry(engine, frame, attempts, delay) {
    Some(tensor) => session.process(&tensor, canvas, threshold),
    None => session.process_failure(),
  };
}

pub struct OneShotTask {
  session: DetectionSession,
  canvas: CanvasSize,
}

impl OneShotTask {
  pub fn new(session: DetectionSession, canvas: CanvasSize) -> Self {
    Self { session, canvas }
  }
}

impl<F, RE, I, E, O> Task<I, E, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  E: InferenceEngine<Input = F>,
  E::Error: Display,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(mut self, mut input: I, mut engine: E, output: O) -> Result<(), Self::Error> {
    self.session.config().validate()?;
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    infer_once(&mut self.session, &mut engine, &frame, self.canvas);
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    output.render_result(&self.session.snapshot(1, self.canvas))?;
    info!("渲染完成");

    Ok(())
  }
}

pub struct RepeatShotTask {
  session: DetectionSession,
  canvas: CanvasSize,
  repeat: usize,
}

impl RepeatShotTask {
  pub fn new(session: DetectionSession, canvas: CanvasSize) -> Self {
    Self {
      session,
      canvas,
      repeat: 1000,
    }
  }

  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }
}

impl<F, RE, I, E, O> Task<I, E, O> for RepeatShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  E: InferenceEngine<Input = F>,
  E::Error: Display,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(mut self, mut input: I, mut engine: E, output: O) -> Result<(), Self::Error> {
    self.session.config().validate()?;
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      infer_once(&mut self.session, &mut engine, &frame, self.canvas);
      let elapsed = now.elapsed();
      debug!("({})推理与后处理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
    }
    output.render_result(&self.session.snapshot(self.repeat as u64, self.canvas))?;

    // 前两次视为预热
    let measured = if times.len() > 2 { &times[2..] } else { &times[..] };
    warn!(
      "平均耗时: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    Ok(())
  }
}

/// 推理循环与渲染循环各自按自己的节奏运行
pub struct ContinuousTask {
  session: DetectionSession,
  canvas: CanvasSize,
  frame_number: Option<usize>,
  render_interval: Duration,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn new(session: DetectionSession, canvas: CanvasSize) -> Self {
    Self {
      session,
      canvas,
      frame_number: None,
      render_interval: Duration::from_millis(33),
      handle_interrupt: false,
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_render_interval(mut self, render_interval: Duration) -> Self {
    self.render_interval = render_interval;
    self
  }

  /// 安装 Ctrl-C 处理；每个进程只能安装一次
  pub fn with_interrupt_handler(mut self) -> Self {
    self.handle_interrupt = true;
    self
  }
}

impl<F, RE, I, E, O> Task<I, E, O> for ContinuousTask
where
  F: Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F> + Send,
  E: InferenceEngine<Input = F> + Send + 'static,
  E::Error: Display,
  O: Render<Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, engine: E, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let running = Arc::new(AtomicBool::new(true));
    if self.handle_interrupt {
      let running = running.clone();
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        running.store(false, Ordering::Release);
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let canvas = self.canvas;
    let threshold = self.session.config().confidence_threshold;
    let frame_number = self.frame_number;
    let render_interval = self.render_interval;
    let mut detector = Detector::spawn(engine, self.session)?;
    let feeding_done = AtomicBool::new(false);

    let (submitted, rendered) = thread::scope(|scope| -> anyhow::Result<(usize, usize)> {
      let detector = &detector;
      let feeding_done = &feeding_done;
      let running = &running;

      let feeder = scope.spawn(move || -> anyhow::Result<usize> {
        let result = (|| -> anyhow::Result<usize> {
          let mut frame_index = 0;
          for frame in input {
            if !running.load(Ordering::Acquire) {
              warn!("中断信号接收，退出推理循环");
              break;
            }
            detector.submit(frame, canvas, threshold)?;
            frame_index += 1;
            debug!("提交第 {} 帧", frame_index);
            if frame_number.is_some_and(|n| frame_index >= n) {
              info!("达到指定帧数 {}, 退出推理循环", frame_index);
              break;
            }
          }
          detector.wait_idle();
          Ok(frame_index)
        })();
        feeding_done.store(true, Ordering::Release);
        result
      });

      let render = (|| -> anyhow::Result<usize> {
        let mut last_sequence = 0;
        let mut rendered = 0;
        loop {
          let done = feeding_done.load(Ordering::Acquire);
          let snapshot = detector.snapshot();
          if snapshot.sequence != last_sequence {
            output.render_result(&snapshot)?;
            last_sequence = snapshot.sequence;
            rendered += 1;
          }
          if done || !running.load(Ordering::Acquire) {
            break;
          }
          thread::sleep(render_interval);
        }
        Ok(rendered)
      })();

      if render.is_err() {
        detector.halt();
      }
      let submitted = feeder
        .join()
        .map_err(|_| anyhow::anyhow!("推理循环异常退出"))??;
      Ok((submitted, render?))
    })?;

    detector.stop();
    info!("任务完成，提交 {} 帧，渲染 {} 次", submitted, rendered);
    Ok(())
  }
}
