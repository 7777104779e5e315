//! Recording test double for [`PoolEngine`].
//!
//! `MockEngine` keeps a worker count and enforces the kill bound like a real
//! engine, but never runs a thread. Tasks are captured instead of executed and
//! can be fed through the installed handler on demand.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;

use multipool_api::{
    EngineError, EngineFactory, EngineResult, PoolConfig, PoolEngine, PoolId, PoolStats,
    TaskHandler,
};

/// One recorded engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    SetTaskHandler,
    Enqueue,
    ResizeWorkersBy(i64),
    KillWorkers(i64),
    SetWorkerCount(usize),
    PauseAll,
    ResumeAll,
    Drain,
    WaitUntilIdle,
}

struct MockState<T> {
    workers: usize,
    paused: bool,
    draining: bool,
    handler: Option<TaskHandler<T>>,
    payloads: Vec<T>,
    submitted: u64,
    calls: Vec<MockCall>,
}

pub struct MockEngine<T> {
    state: Mutex<MockState<T>>,
    idle_delay: Duration,
    queue_depth: usize,
    fail_resize: AtomicBool,
    fail_enqueue: AtomicBool,
}

impl<T> fmt::Debug for MockEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockEngine")
            .field("workers", &state.workers)
            .field("paused", &state.paused)
            .field("queued", &state.payloads.len())
            .field("calls", &state.calls)
            .finish()
    }
}

impl<T> Default for MockEngine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MockEngine<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                workers: 0,
                paused: false,
                draining: false,
                handler: None,
                payloads: Vec::new(),
                submitted: 0,
                calls: Vec::new(),
            }),
            idle_delay: Duration::ZERO,
            queue_depth: usize::MAX,
            fail_resize: AtomicBool::new(false),
            fail_enqueue: AtomicBool::new(false),
        }
    }

    /// Makes `wait_until_idle` take `delay` before resolving.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Makes every resize fail with `EngineError::ResizeFailed`.
    pub fn fail_resize(&self, fail: bool) {
        self.fail_resize.store(fail, Ordering::SeqCst);
    }

    /// Makes every enqueue fail with `EngineError::QueueFull`.
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn was_called(&self, call: MockCall) -> bool {
        self.lock().calls.contains(&call)
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn handler_set(&self) -> bool {
        self.lock().handler.is_some()
    }

    /// Removes and returns the captured payloads.
    pub fn take_payloads(&self) -> Vec<T> {
        std::mem::take(&mut self.lock().payloads)
    }

    /// Passes `payload` to the installed handler, if any.
    pub fn run_handler(&self, payload: T) -> Option<bool> {
        let handler = self.lock().handler.clone();
        handler.map(|handler| handler(payload))
    }

    fn lock(&self) -> MutexGuard<'_, MockState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_resize(&self) -> EngineResult<()> {
        if self.fail_resize.load(Ordering::SeqCst) {
            return Err(EngineError::ResizeFailed("injected resize failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<T: Send + 'static> PoolEngine<T> for MockEngine<T> {
    fn set_task_handler(&self, handler: TaskHandler<T>) {
        let mut state = self.lock();
        state.calls.push(MockCall::SetTaskHandler);
        state.handler = Some(handler);
    }

    async fn enqueue(&self, payload: T) -> EngineResult<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Enqueue);
        if state.draining {
            return Err(EngineError::Closed);
        }
        if self.fail_enqueue.load(Ordering::SeqCst) || state.payloads.len() >= self.queue_depth {
            return Err(EngineError::QueueFull {
                capacity: self.queue_depth,
            });
        }
        state.payloads.push(payload);
        state.submitted += 1;
        Ok(())
    }

    fn resize_workers_by(&self, delta: i64) -> EngineResult<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::ResizeWorkersBy(delta));
        self.check_resize()?;
        let amount = usize::try_from(delta)
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or(EngineError::InvalidAmount(delta))?;
        state.workers += amount;
        Ok(())
    }

    fn kill_workers(&self, amount: i64) -> EngineResult<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::KillWorkers(amount));
        let count = usize::try_from(amount)
            .ok()
            .filter(|count| *count > 0)
            .ok_or(EngineError::InvalidAmount(amount))?;
        if count > state.workers {
            return Err(EngineError::ExcessiveKillAmount {
                requested: amount,
                live: state.workers,
            });
        }
        state.workers -= count;
        Ok(())
    }

    fn set_worker_count(&self, count: usize) -> EngineResult<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::SetWorkerCount(count));
        self.check_resize()?;
        state.workers = count;
        Ok(())
    }

    fn pause_all(&self) {
        let mut state = self.lock();
        state.calls.push(MockCall::PauseAll);
        state.paused = true;
    }

    fn resume_all(&self) {
        let mut state = self.lock();
        state.calls.push(MockCall::ResumeAll);
        state.paused = false;
    }

    fn drain(&self) {
        let mut state = self.lock();
        state.calls.push(MockCall::Drain);
        state.draining = true;
        state.workers = 0;
    }

    async fn wait_until_idle(&self) -> EngineResult<()> {
        self.lock().calls.push(MockCall::WaitUntilIdle);
        if !self.idle_delay.is_zero() {
            tokio::time::sleep(self.idle_delay).await;
        }
        Ok(())
    }

    fn live_worker_count(&self) -> usize {
        self.lock().workers
    }

    fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            submitted: state.submitted,
            queued: state.payloads.len(),
            queue_capacity: self.queue_depth,
            live_workers: state.workers,
            running_workers: state.workers,
            paused: state.paused,
            draining: state.draining,
            ..Default::default()
        }
    }
}

/// Builds [`MockEngine`]s and keeps each one for inspection.
pub struct MockEngineFactory<T> {
    engines: Mutex<HashMap<String, Arc<MockEngine<T>>>>,
    idle_delay: Duration,
    fail_build: AtomicBool,
}

impl<T> fmt::Debug for MockEngineFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engines = self.engines.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("MockEngineFactory")
            .field("engines", &engines.keys().collect::<Vec<_>>())
            .field("idle_delay", &self.idle_delay)
            .finish()
    }
}

impl<T> Default for MockEngineFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MockEngineFactory<T> {
    pub fn new() -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
            idle_delay: Duration::ZERO,
            fail_build: AtomicBool::new(false),
        }
    }

    /// Every built engine delays `wait_until_idle` by `delay`.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Makes `build` fail.
    pub fn fail_build(&self, fail: bool) {
        self.fail_build.store(fail, Ordering::SeqCst);
    }

    /// The engine built for `id`, if any.
    pub fn engine(&self, id: &str) -> Option<Arc<MockEngine<T>>> {
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn built(&self) -> usize {
        self.engines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<T: Send + 'static> EngineFactory<T> for MockEngineFactory<T> {
    fn build(&self, id: &PoolId, config: PoolConfig) -> EngineResult<Arc<dyn PoolEngine<T>>> {
        if self.fail_build.load(Ordering::SeqCst) {
            return Err(EngineError::Other(anyhow!("injected build failure for `{id}`")));
        }
        let engine = Arc::new(
            MockEngine::new()
                .with_idle_delay(self.idle_delay)
                .with_queue_depth(config.queue_depth),
        );
        self.engines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::clone(&engine));
        Ok(engine)
    }
}
