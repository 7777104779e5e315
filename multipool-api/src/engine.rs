//! # Pool Engine Contract
//!
//! This module defines the capability set an orchestrator requires from a
//! single pool's runtime. The engine owns the bounded task queue, the workers,
//! and the installed handler. The orchestrator only validates, looks up, and
//! delegates.
//!
//! ## Core Components
//!
//! - `PoolEngine`: operations on one running pool
//! - `EngineFactory`: builds a fresh engine for a newly registered pool
//! - `PoolConfig`: per-pool engine settings
//! - `BackpressureStrategy`: behaviour of `enqueue` on a full queue
//!
//! ## Contract Notes
//!
//! - Engines are created with zero workers. Workers only appear after an
//!   explicit resize, so a handler can be installed before any task is consumed.
//! - Killing workers is graceful. A targeted worker finishes its in-flight
//!   task before terminating.
//! - `pause_all`/`resume_all` only affect whether workers pull new tasks.
//! - Every method must be safe to call concurrently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::EngineResult;
use crate::identifier::PoolId;
use crate::payload::TaskHandler;
use crate::stats::PoolStats;

/// Queue depth used when none is configured.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// Defines the behavior when `enqueue` is called on a full queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackpressureStrategy {
    /// `enqueue` waits until space becomes available.
    #[default]
    Block,
    /// `enqueue` immediately fails with `EngineError::QueueFull`.
    Error,
}

/// Settings used to build one pool engine.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum number of queued tasks.
    pub queue_depth: usize,

    /// Log per-task and per-worker events at `info` instead of `debug`.
    pub verbose: bool,

    /// What `enqueue` does when the queue is full.
    pub backpressure: BackpressureStrategy,

    /// How often an idle worker re-checks pause and drain state.
    pub idle_poll_interval: Duration,

    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            verbose: false,
            backpressure: BackpressureStrategy::Block,
            idle_poll_interval: Duration::from_millis(10),
            thread_name_prefix: "multipool-".to_string(),
        }
    }
}

/// Runtime of a single named pool.
#[async_trait]
pub trait PoolEngine<T>: fmt::Debug + Send + Sync
where
    T: Send + 'static,
{
    /// Installs the function invoked once per dequeued task, replacing any
    /// previous one.
    fn set_task_handler(&self, handler: TaskHandler<T>);

    /// Adds one task to the queue.
    async fn enqueue(&self, payload: T) -> EngineResult<()>;

    /// Increases the worker count by a positive `delta`.
    fn resize_workers_by(&self, delta: i64) -> EngineResult<()>;

    /// Gracefully stops `amount` workers.
    ///
    /// Fails with `ExcessiveKillAmount` if `amount` exceeds
    /// [`live_worker_count`](Self::live_worker_count).
    fn kill_workers(&self, amount: i64) -> EngineResult<()>;

    /// Sets the worker count to exactly `count`.
    fn set_worker_count(&self, count: usize) -> EngineResult<()>;

    /// Stops all workers from pulling new tasks.
    fn pause_all(&self);

    /// Lets paused workers pull tasks again.
    fn resume_all(&self);

    /// Makes every worker exit once the queue is empty.
    fn drain(&self);

    /// Resolves once no worker is active.
    async fn wait_until_idle(&self) -> EngineResult<()>;

    /// Current worker count.
    fn live_worker_count(&self) -> usize;

    /// Snapshot of the engine counters.
    fn stats(&self) -> PoolStats;
}

/// Builds engines for newly registered pools.
pub trait EngineFactory<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Creates an engine with zero workers.
    fn build(&self, id: &PoolId, config: PoolConfig) -> EngineResult<Arc<dyn PoolEngine<T>>>;
}

impl<T, F> EngineFactory<T> for F
where
    T: Send + 'static,
    F: Fn(&PoolId, PoolConfig) -> EngineResult<Arc<dyn PoolEngine<T>>> + Send + Sync,
{
    fn build(&self, id: &PoolId, config: PoolConfig) -> EngineResult<Arc<dyn PoolEngine<T>>> {
        self(id, config)
    }
}
