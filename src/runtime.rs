// 该文件是 Beifeng （北风） 项目的一部分。
// src/runtime.rs - 推理线程与检测快照
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
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc::{Receiver, SyncSender, TrySendError, sync_channel},
  },
  thread::{self, JoinHandle},
  time::Duration,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  config::{ConfigError, check_threshold},
  engine::{InferenceEngine, run_with_retry},
  geometry::CanvasSize,
  session::{Detection, DetectionSession, Snapshot},
};

#[derive(Error, Debug)]
pub enum RuntimeError {
  #[error("已有推理正在进行")]
  Busy,
  #[error("检测已停止")]
  Stopped,
  #[error("配置错误: {0}")]
  Config(#[from] ConfigError),
  #[error("无法启动推理线程: {0}")]
  Spawn(#[from] std::io::Error),
}

/// 被拒绝的提交，附带原输入以便调用方稍后重试
#[derive(Debug)]
pub struct Rejected<I> {
  pub input: I,
  pub reason: RuntimeError,
}

struct Request<I> {
  input: I,
  canvas: CanvasSize,
  threshold: f32,
  generation: u64,
}

/// 推理线程与调用方共享的状态
struct Shared {
  active: AtomicBool,
  generation: AtomicU64,
  in_flight: AtomicBool,
  snapshot: Mutex<Arc<Snapshot>>,
}

impl Shared {
  fn lock_snapshot(&self) -> MutexGuard<'_, Arc<Snapshot>> {
    self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 仍处于活动状态且代数未变时才发布，返回是否发布
  fn publish(&self, generation: u64, canvas: CanvasSize, detections: Vec<Detection>) -> bool {
    let mut slot = self.lock_snapshot();
    if !self.active.load(Ordering::Acquire) || self.generation.load(Ordering::Acquire) != generation
    {
      return false;
    }
    *slot = Arc::new(Snapshot {
      sequence: slot.sequence + 1,
      canvas: Some(canvas),
      detections,
    });
    true
  }
}

/// 单槽推理调度：同一时刻最多一个推理在进行
///
/// 推理线程独占引擎与 [`DetectionSession`]，结果以整体替换的
/// `Arc<Snapshot>` 发布给渲染端。停止或切换输入源后，进行中的推理
/// 仍会完成，但其结果被丢弃。
pub struct Detector<I> {
  shared: Arc<Shared>,
  sender: Option<SyncSender<Request<I>>>,
  worker: Option<JoinHandle<()>>,
  poll_interval: Duration,
}

impl<I: Send + 'static> Detector<I> {
  pub fn spawn<E>(engine: E, session: DetectionSession) -> Result<Self, RuntimeError>
  where
    E: InferenceEngine<Input = I> + Send + 'static,
    E::Error: Display,
  {
    session.config().validate()?;
    let poll_interval = session.config().poll_interval;

    let shared = Arc::new(Shared {
      active: AtomicBool::new(true),
      generation: AtomicU64::new(0),
      in_flight: AtomicBool::new(false),
      snapshot: Mutex::new(Arc::new(Snapshot::default())),
    });

    // 容量为 1：in_flight 标记保证槽内最多一个请求
    let (sender, receiver) = sync_channel(1);
    let worker_shared = shared.clone();
    let worker = thread::Builder::new()
      .name("beifeng-inference".to_string())
      .spawn(move || inference_loop(engine, session, receiver, worker_shared))?;

    info!("推理线程已启动");
    Ok(Self {
      shared,
      sender: Some(sender),
      worker: Some(worker),
      poll_interval,
    })
  }

  /// 立即提交一帧；已有推理进行中时返回 `Busy`
  pub fn try_submit(
    &self,
    input: I,
    canvas: CanvasSize,
    threshold: f32,
  ) -> Result<(), Rejected<I>> {
    if let Err(e) = check_threshold(threshold) {
      return Err(Rejected {
        input,
        reason: e.into(),
      });
    }
    let Some(sender) = self.sender.as_ref().filter(|_| self.is_active()) else {
      return Err(Rejected {
        input,
        reason: RuntimeError::Stopped,
      });
    };
    if self.worker_finished() {
      return Err(Rejected {
        input,
        reason: RuntimeError::Stopped,
      });
    }
    if self
      .shared
      .in_flight
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      // 推理线程异常退出时标记可能残留
      let reason = if self.worker_finished() {
        RuntimeError::Stopped
      } else {
        RuntimeError::Busy
      };
      return Err(Rejected { input, reason });
    }

    let request = Request {
      input,
      canvas,
      threshold,
      generation: self.shared.generation.load(Ordering::Acquire),
    };
    match sender.try_send(request) {
      Ok(()) => Ok(()),
      Err(TrySendError::Full(request)) | Err(TrySendError::Disconnected(request)) => {
        self.shared.in_flight.store(false, Ordering::Release);
        Err(Rejected {
          input: request.input,
          reason: RuntimeError::Stopped,
        })
      }
    }
  }

  /// 提交一帧，繁忙时按 `poll_interval` 等待后重试
  pub fn submit(&self, input: I, canvas: CanvasSize, threshold: f32) -> Result<(), RuntimeError> {
    let mut input = input;
    loop {
      match self.try_submit(input, canvas, threshold) {
        Ok(()) => return Ok(()),
        Err(Rejected {
          input: back,
          reason: RuntimeError::Busy,
        }) => {
          input = back;
          thread::sleep(self.poll_interval);
        }
        Err(rejected) => return Err(rejected.reason),
      }
    }
  }

  pub fn is_busy(&self) -> bool {
    self.shared.in_flight.load(Ordering::Acquire) && !self.worker_finished()
  }

  fn worker_finished(&self) -> bool {
    self.worker.as_ref().is_none_or(|w| w.is_finished())
  }

  pub fn is_active(&self) -> bool {
    self.shared.active.load(Ordering::Acquire)
  }

  /// 等待当前推理完成
  pub fn wait_idle(&self) {
    while self.is_busy() {
      thread::sleep(self.poll_interval);
    }
  }

  /// 最新发布的检测快照
  pub fn snapshot(&self) -> Arc<Snapshot> {
    self.shared.lock_snapshot().clone()
  }

  /// 切换输入源：进行中的结果作废，跟踪集合在下一帧前清空
  pub fn switch_source(&self) {
    let mut slot = self.shared.lock_snapshot();
    let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
    *slot = Arc::new(Snapshot {
      sequence: slot.sequence + 1,
      canvas: None,
      detections: Vec::new(),
    });
    info!("切换输入源，当前代数 {}", generation);
  }

  /// 停止调度新的推理；不等待进行中的推理
  pub fn halt(&self) {
    let _slot = self.shared.lock_snapshot();
    self.shared.active.store(false, Ordering::Release);
  }

  /// 停止并等待推理线程退出，进行中的推理结果被丢弃
  pub fn stop(&mut self) {
    self.halt();
    self.sender.take();
    if let Some(worker) = self.worker.take() {
      if worker.join().is_err() {
        warn!("推理线程异常退出");
      }
      info!("推理线程已停止");
    }
  }
}

impl<I> Drop for Detector<I> {
  fn drop(&mut self) {
    self.shared.active.store(false, Ordering::Release);
    self.sender.take();
    if let Some(worker) = self.worker.take() {
      let _ = worker.join();
    }
  }
}

/// 推理线程退出（包括 panic 展开）时清除推理进行中标记
///
/// 在接收端之后析构，清除标记后新的提交只会得到 `Disconnected`。
struct InFlightGuard(Arc<Shared>);

impl Drop for InFlightGuard {
  fn drop(&mut self) {
    self.0.in_flight.store(false, Ordering::Release);
  }
}

fn inference_loop<E>(
  mut engine: E,
  mut session: DetectionSession,
  receiver: Receiver<Request<E::Input>>,
  shared: Arc<Shared>,
) where
  E: InferenceEngine,
  E::Error: Display,
{
  let attempts = session.config().retry_attempts;
  let delay = session.config().retry_delay;
  let mut current_generation = 0;

  let _in_flight = InFlightGuard(shared.clone());
  for request in receiver {
    let output = run_with_retry(&mut engine, &request.input, attempts, delay);

    let stale = !shared.active.load(Ordering::Acquire)
      || shared.generation.load(Ordering::Acquire) != request.generation;
    if stale {
      debug!("丢弃过期的推理结果 (代数 {})", request.generation);
      shared.in_flight.store(false, Ordering::Release);
      continue;
    }

    if request.generation != current_generation {
      session.reset();
      current_generation = request.generation;
    }

    match output {
      Some(tensor) => session.process(&tensor, request.canvas, request.threshold),
      None => session.process_failure(),
    };

    if !shared.publish(request.generation, request.canvas, session.detections()) {
      debug!("会话已失效，结果未发布");
    }
    shared.in_flight.store(false, Ordering::Release);
  }

  debug!("推理队列已关闭");
}
