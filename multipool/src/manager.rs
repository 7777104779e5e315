//! # Pool Manager
//!
//! `PoolManager` is the registry and orchestrator of named worker pools. It
//! owns the identifier → handle mapping, validates every request, and
//! delegates the actual work to each pool's [`PoolEngine`].
//!
//! ## Key Concepts
//! - Registry: pools are added by `create`/`adopt` and never removed
//! - Validation: malformed input is rejected before any engine call
//! - Delegation: engine errors are translated into [`PoolError`]s
//! - Fan-out: `wait_all` waits on every registered pool concurrently
//!
//! ## Lifecycle of one pool
//!
//! ```text
//! create ──▶ set_handler ──▶ start ──▶ submit / add_workers / remove_workers
//!                              │  ▲
//!                        pause ▼  │ resume
//!                            Paused
//!
//! drain ──▶ workers exit once the queue is empty ──▶ wait returns
//! ```
//!
//! ## Locking
//! The registry sits behind one `RwLock`. It is held only to look up or insert
//! a handle, never across an engine call or an `.await`, so operations on
//! different pools never block each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

use multipool_api::{
    task_handler, EngineFactory, Payload, PoolEngine, PoolError, PoolId, PoolInfo, PoolResult,
    PoolStats, TaskHandler,
};

use crate::config::ManagerConfig;
use crate::engine::WorkerPoolFactory;

/// Registry entry for one pool.
struct PoolHandle<T: Send + 'static> {
    id: PoolId,

    /// Engine owned by this pool alone.
    engine: Arc<dyn PoolEngine<T>>,

    /// Worker count applied by `start`.
    initial_workers: Option<usize>,

    /// Copy of the handler installed on the engine.
    handler: Mutex<Option<TaskHandler<T>>>,

    verbose: bool,
    created_at: Instant,
}

impl<T: Send + 'static> PoolHandle<T> {
    fn handler_set(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Orchestrator for several independently configured worker pools.
///
/// `T` is the task payload type shared by every pool of this manager.
///
/// # Examples
///
/// ```rust,no_run
/// use multipool::PoolManager;
///
/// # async fn run() -> multipool::PoolResult<()> {
/// let manager = PoolManager::<String>::default();
/// manager.create("thumbnails", 4, 128, false)?;
/// manager.set_handler("thumbnails", |job: String| {
///     println!("processing {job}");
///     true
/// })?;
/// manager.start("thumbnails")?;
///
/// manager.submit("thumbnails", "img-001.png".to_string()).await?;
/// manager.drain("thumbnails")?;
/// manager.wait_all().await?;
/// # Ok(())
/// # }
/// ```
pub struct PoolManager<T: Payload + Send + 'static> {
    config: ManagerConfig,
    factory: Arc<dyn EngineFactory<T>>,
    pools: RwLock<HashMap<PoolId, Arc<PoolHandle<T>>>>,
}

impl<T: Payload + Send + 'static> fmt::Debug for PoolManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolManager")
            .field("config", &self.config)
            .field("pools", &self.pool_ids())
            .finish()
    }
}

impl<T: Payload + Send + 'static> Default for PoolManager<T> {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl<T: Payload + Send + 'static> PoolManager<T> {
    /// Creates a manager whose pools run on [`WorkerPool`](crate::engine::WorkerPool)s.
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_factory(config, Arc::new(WorkerPoolFactory))
    }

    /// Creates a manager that builds engines with `factory`.
    pub fn with_factory(config: ManagerConfig, factory: Arc<dyn EngineFactory<T>>) -> Self {
        Self {
            config,
            factory,
            pools: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn read_pools(&self) -> RwLockReadGuard<'_, HashMap<PoolId, Arc<PoolHandle<T>>>> {
        self.pools.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_pools(&self) -> RwLockWriteGuard<'_, HashMap<PoolId, Arc<PoolHandle<T>>>> {
        self.pools.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, id: &str) -> PoolResult<Arc<PoolHandle<T>>> {
        self.read_pools()
            .get(id)
            .cloned()
            .ok_or_else(|| PoolError::UnknownIdentifier(id.to_string()))
    }

    /// Registers a new pool with zero workers.
    ///
    /// `initial_workers` is recorded and applied by [`start`](Self::start).
    /// The engine factory runs under the registry write lock and must not call
    /// back into the manager.
    ///
    /// # Errors
    /// - `EmptyIdentifier` if `id` is empty after trimming
    /// - `InvalidQueueDepth` if `max_queue_depth` is zero
    /// - `DuplicateIdentifier` if `id` is already registered
    /// - `EngineUnavailable` if the factory fails
    pub fn create(
        &self,
        id: &str,
        initial_workers: usize,
        max_queue_depth: usize,
        verbose: bool,
    ) -> PoolResult<()> {
        let id = PoolId::new(id)?;
        if max_queue_depth < 1 {
            return Err(PoolError::InvalidQueueDepth(max_queue_depth));
        }

        let mut pools = self.write_pools();
        if pools.contains_key(&id) {
            return Err(PoolError::DuplicateIdentifier(id.into_inner()));
        }

        let engine = self
            .factory
            .build(&id, self.config.pool_config(max_queue_depth, verbose))
            .map_err(|source| PoolError::EngineUnavailable {
                pool: id.to_string(),
                source,
            })?;

        pools.insert(
            id.clone(),
            Arc::new(PoolHandle {
                id: id.clone(),
                engine,
                initial_workers: Some(initial_workers),
                handler: Mutex::new(None),
                verbose,
                created_at: Instant::now(),
            }),
        );
        drop(pools);

        info!(pool = %id, initial_workers, queue_depth = max_queue_depth, "pool created");
        Ok(())
    }

    /// Registers a new pool using the manager's default worker count and
    /// queue depth.
    pub fn create_with_defaults(&self, id: &str) -> PoolResult<()> {
        self.create(
            id,
            self.config.default_initial_workers,
            self.config.default_queue_depth,
            false,
        )
    }

    /// Registers an engine built by the caller.
    ///
    /// A pool adopted with `initial_workers: None` cannot be started; resize
    /// it with [`add_workers`](Self::add_workers) or
    /// [`set_worker_count`](Self::set_worker_count) instead.
    pub fn adopt(
        &self,
        id: &str,
        initial_workers: Option<usize>,
        engine: Arc<dyn PoolEngine<T>>,
    ) -> PoolResult<()> {
        let id = PoolId::new(id)?;

        let mut pools = self.write_pools();
        if pools.contains_key(&id) {
            return Err(PoolError::DuplicateIdentifier(id.into_inner()));
        }
        pools.insert(
            id.clone(),
            Arc::new(PoolHandle {
                id: id.clone(),
                engine,
                initial_workers,
                handler: Mutex::new(None),
                verbose: false,
                created_at: Instant::now(),
            }),
        );
        drop(pools);

        info!(pool = %id, ?initial_workers, "engine adopted");
        Ok(())
    }

    /// Spawns the pool's recorded initial workers.
    ///
    /// Calling `start` again sets the worker count back to the initial value.
    pub fn start(&self, id: &str) -> PoolResult<()> {
        let handle = self.handle(id)?;
        let workers = handle
            .initial_workers
            .ok_or_else(|| PoolError::UninitializedPool(id.to_string()))?;

        let _span = crate::pool_span!(handle.id, workers).entered();
        handle
            .engine
            .set_worker_count(workers)
            .map_err(|e| PoolError::from_resize(id, e))?;

        info!("pool started");
        Ok(())
    }

    /// Installs the function run once per task, replacing any previous one.
    pub fn set_handler<F>(&self, id: &str, handler: F) -> PoolResult<()>
    where
        F: Fn(T) -> bool + Send + Sync + 'static,
    {
        self.set_task_handler(id, task_handler(handler))
    }

    /// Installs an already shared handler.
    pub fn set_task_handler(&self, id: &str, handler: TaskHandler<T>) -> PoolResult<()> {
        let handle = self.handle(id)?;
        *handle.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&handler));
        handle.engine.set_task_handler(handler);

        debug!(pool = %handle.id, "task handler set");
        Ok(())
    }

    /// Queues one task on the pool.
    ///
    /// With blocking backpressure this waits while the queue is full.
    pub async fn submit(&self, id: &str, payload: T) -> PoolResult<()> {
        if payload.is_empty_payload() {
            return Err(PoolError::EmptyPayload);
        }
        let handle = self.handle(id)?;

        handle
            .engine
            .enqueue(payload)
            .instrument(crate::pool_span!(handle.id))
            .await
            .map_err(|e| PoolError::from_enqueue(id, e))?;

        crate::log_pool_event!(handle.verbose, handle.id, "task submitted");
        Ok(())
    }

    /// Adds `amount` workers to the pool.
    ///
    /// Only zero is rejected here; the engine decides on negative amounts.
    pub fn add_workers(&self, id: &str, amount: i64) -> PoolResult<()> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let handle = self.handle(id)?;
        handle
            .engine
            .resize_workers_by(amount)
            .map_err(|e| PoolError::from_resize(id, e))?;

        info!(pool = %handle.id, added = amount, live = handle.engine.live_worker_count(), "workers added");
        Ok(())
    }

    /// Gracefully stops `amount` workers. Each finishes its current task first.
    ///
    /// Unlike [`add_workers`](Self::add_workers), the pool is looked up before
    /// the amount is checked.
    pub fn remove_workers(&self, id: &str, amount: i64) -> PoolResult<()> {
        let handle = self.handle(id)?;
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        handle
            .engine
            .kill_workers(amount)
            .map_err(|e| PoolError::from_resize(id, e))?;

        info!(pool = %handle.id, removed = amount, live = handle.engine.live_worker_count(), "workers removed");
        Ok(())
    }

    /// Sets the pool's worker count to exactly `amount`.
    pub fn set_worker_count(&self, id: &str, amount: i64) -> PoolResult<()> {
        let count = usize::try_from(amount).map_err(|_| PoolError::NegativeAmount(amount))?;
        let handle = self.handle(id)?;
        handle
            .engine
            .set_worker_count(count)
            .map_err(|e| PoolError::from_resize(id, e))?;

        info!(pool = %handle.id, workers = count, "worker count set");
        Ok(())
    }

    /// Stops the pool's workers from pulling new tasks.
    pub fn pause(&self, id: &str) -> PoolResult<()> {
        self.handle(id)?.engine.pause_all();
        Ok(())
    }

    pub fn resume(&self, id: &str) -> PoolResult<()> {
        self.handle(id)?.engine.resume_all();
        Ok(())
    }

    /// Lets the pool finish its queued tasks, then stops every worker.
    ///
    /// Draining is final: the pool accepts no further tasks or workers. A
    /// paused pool drains too; only a task a worker pulled just before the
    /// pause waits for [`resume`](Self::resume).
    pub fn drain(&self, id: &str) -> PoolResult<()> {
        self.handle(id)?.engine.drain();
        Ok(())
    }

    /// Waits until the pool has no running workers.
    ///
    /// A pool that still has workers and is not draining never becomes idle;
    /// call [`drain`](Self::drain) or remove its workers first.
    pub async fn wait(&self, id: &str) -> PoolResult<()> {
        let handle = self.handle(id)?;
        wait_for_pool(handle).await;
        Ok(())
    }

    /// Waits on every pool registered at call time, concurrently.
    ///
    /// Pools created after the call starts are not waited on. A failed wait on
    /// one pool is logged and does not affect the others.
    pub async fn wait_all(&self) -> PoolResult<()> {
        let handles: Vec<_> = self.read_pools().values().cloned().collect();
        if handles.is_empty() {
            return Err(PoolError::EmptyRegistry);
        }

        debug!(pools = handles.len(), "waiting for all pools");
        let mut waits = JoinSet::new();
        for handle in handles {
            waits.spawn(wait_for_pool(handle));
        }

        while let Some(joined) = waits.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "pool wait task failed");
            }
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_pools().contains_key(id)
    }

    /// Number of registered pools.
    pub fn len(&self) -> usize {
        self.read_pools().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_pools().is_empty()
    }

    /// Registered pool identifiers in lexical order.
    pub fn pool_ids(&self) -> Vec<PoolId> {
        let mut ids: Vec<_> = self.read_pools().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The pool's current worker count.
    pub fn live_workers(&self, id: &str) -> PoolResult<usize> {
        Ok(self.handle(id)?.engine.live_worker_count())
    }

    pub fn stats(&self, id: &str) -> PoolResult<PoolStats> {
        Ok(self.handle(id)?.engine.stats())
    }

    /// Registry and engine view of one pool.
    pub fn info(&self, id: &str) -> PoolResult<PoolInfo> {
        let handle = self.handle(id)?;
        Ok(PoolInfo {
            id: handle.id.clone(),
            initial_workers: handle.initial_workers,
            handler_set: handle.handler_set(),
            uptime: handle.created_at.elapsed(),
            stats: handle.engine.stats(),
        })
    }
}

async fn wait_for_pool<T: Send + 'static>(handle: Arc<PoolHandle<T>>) {
    let span = crate::pool_span!(handle.id);
    async {
        match handle.engine.wait_until_idle().await {
            Ok(()) => crate::log_pool_event!(handle.verbose, handle.id, "pool idle"),
            Err(e) => warn!(error = %e, "wait on pool failed"),
        }
    }
    .instrument(span)
    .await
}
