use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use async_trait::async_trait;
use flume::{Sender, TrySendError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use multipool_api::{
    BackpressureStrategy, EngineError, EngineFactory, EngineResult, PoolConfig, PoolEngine,
    PoolId, PoolStats, TaskHandler,
};

use super::worker::{Counters, PauseGate, PoolShared, Worker};

/// Worker bookkeeping, guarded by one lock so resizes never interleave.
#[derive(Debug, Default)]
struct WorkerSet {
    /// Target worker count.
    live: usize,
    next_worker_id: usize,
    handles: Vec<JoinHandle<()>>,
}

/// Thread-backed pool engine.
///
/// Workers are OS threads pulling from a bounded `flume` queue. The pool
/// starts with zero workers; call [`resize_workers_by`](PoolEngine::resize_workers_by)
/// or [`set_worker_count`](PoolEngine::set_worker_count) to start consuming.
///
/// # Worker counts
/// - `live_worker_count` is the target count. Resizes and kills adjust it
///   immediately.
/// - The running count tracks threads that have not exited. A killed worker
///   stays running until it finishes its current task. `wait_until_idle`
///   resolves when the running count reaches zero.
///
/// # Draining
/// `drain` is one-way. Workers exit once the queue is empty. Afterwards
/// `enqueue` fails with `EngineError::Closed` and resizes are refused.
///
/// Dropping the pool stops every worker after its current task; queued tasks
/// are discarded.
pub struct WorkerPool<T: Send + 'static> {
    shared: Arc<PoolShared<T>>,
    task_tx: Sender<T>,
    kill_tx: Sender<()>,
    workers: Mutex<WorkerSet>,
}

impl<T: Send + 'static> fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.id)
            .field("queue_depth", &self.shared.config.queue_depth)
            .field("live_workers", &self.live_worker_count())
            .field("running_workers", &self.shared.running_workers())
            .field("paused", &self.shared.gate.is_paused())
            .field("draining", &self.shared.is_draining())
            .finish()
    }
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool with an empty queue of `config.queue_depth` slots and no
    /// workers.
    ///
    /// Worker threads log to the dispatcher that is current here.
    pub fn new(id: PoolId, config: PoolConfig) -> Self {
        let (task_tx, task_rx) = flume::bounded(config.queue_depth);
        let (kill_tx, kill_rx) = flume::unbounded();
        let (running, _) = watch::channel(0usize);

        info!(
            pool = %id,
            queue_depth = config.queue_depth,
            backpressure = ?config.backpressure,
            "worker pool created"
        );

        let shared = Arc::new(PoolShared {
            id,
            config,
            tasks: task_rx,
            kills: kill_rx,
            handler: RwLock::new(None),
            gate: PauseGate::default(),
            draining: Default::default(),
            enqueuing: AtomicUsize::new(0),
            counters: Counters::default(),
            running,
            dispatch: crate::logging::current_subscriber(),
        });

        Self {
            shared,
            task_tx,
            kill_tx,
            workers: Mutex::new(WorkerSet::default()),
        }
    }

    pub fn id(&self) -> &PoolId {
        &self.shared.id
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.config.queue_depth
    }

    /// Number of tasks waiting in the queue.
    pub fn pending_count(&self) -> usize {
        self.task_tx.len()
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, WorkerSet> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn_workers(&self, set: &mut WorkerSet, amount: usize) -> EngineResult<()> {
        if self.shared.is_draining() {
            return Err(EngineError::ResizeFailed(format!(
                "pool `{}` is draining",
                self.shared.id
            )));
        }

        set.handles.retain(|handle| !handle.is_finished());
        for spawned in 0..amount {
            let worker = Worker::new(set.next_worker_id, Arc::clone(&self.shared));
            match worker.spawn() {
                Ok(handle) => {
                    set.next_worker_id += 1;
                    set.live += 1;
                    set.handles.push(handle);
                }
                Err(e) => {
                    warn!(pool = %self.shared.id, error = %e, spawned, requested = amount, "failed to spawn worker");
                    return Err(EngineError::ResizeFailed(format!(
                        "spawned {spawned} of {amount} workers: {e}"
                    )));
                }
            }
        }
        debug!(pool = %self.shared.id, added = amount, live = set.live, "workers added");
        Ok(())
    }

    fn kill(&self, set: &mut WorkerSet, amount: usize) -> EngineResult<()> {
        if amount > set.live {
            return Err(EngineError::ExcessiveKillAmount {
                requested: i64::try_from(amount).unwrap_or(i64::MAX),
                live: set.live,
            });
        }
        for _ in 0..amount {
            // The pool owns a receiver, so the channel cannot be disconnected here.
            self.kill_tx.send(()).map_err(|_| EngineError::Closed)?;
        }
        set.live -= amount;
        debug!(pool = %self.shared.id, killed = amount, live = set.live, "workers asked to stop");
        Ok(())
    }
}

/// Marks one enqueue as in flight until dropped, including on cancellation.
struct EnqueueGuard<'a>(&'a AtomicUsize);

impl<'a> EnqueueGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for EnqueueGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T: Send + 'static> PoolEngine<T> for WorkerPool<T> {
    fn set_task_handler(&self, handler: TaskHandler<T>) {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
        debug!(pool = %self.shared.id, "task handler installed");
    }

    async fn enqueue(&self, payload: T) -> EngineResult<()> {
        // Registered before the drain check so no worker retires while the
        // task is still on its way into the queue.
        let _sending = EnqueueGuard::new(&self.shared.enqueuing);
        if self.shared.is_draining() {
            return Err(EngineError::Closed);
        }

        match self.shared.config.backpressure {
            BackpressureStrategy::Block => self
                .task_tx
                .send_async(payload)
                .await
                .map_err(|_| EngineError::Closed)?,
            BackpressureStrategy::Error => self.task_tx.try_send(payload).map_err(|e| match e {
                TrySendError::Full(_) => EngineError::QueueFull {
                    capacity: self.shared.config.queue_depth,
                },
                TrySendError::Disconnected(_) => EngineError::Closed,
            })?,
        }

        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn resize_workers_by(&self, delta: i64) -> EngineResult<()> {
        let amount = usize::try_from(delta)
            .ok()
            .filter(|amount| *amount > 0)
            .ok_or(EngineError::InvalidAmount(delta))?;
        let mut set = self.lock_workers();
        self.spawn_workers(&mut set, amount)
    }

    fn kill_workers(&self, amount: i64) -> EngineResult<()> {
        let count = usize::try_from(amount)
            .ok()
            .filter(|count| *count > 0)
            .ok_or(EngineError::InvalidAmount(amount))?;
        let mut set = self.lock_workers();
        self.kill(&mut set, count)
    }

    fn set_worker_count(&self, count: usize) -> EngineResult<()> {
        let mut set = self.lock_workers();
        match count.cmp(&set.live) {
            std::cmp::Ordering::Greater => {
                let amount = count - set.live;
                self.spawn_workers(&mut set, amount)
            }
            std::cmp::Ordering::Less => {
                let amount = set.live - count;
                self.kill(&mut set, amount)
            }
            std::cmp::Ordering::Equal => Ok(()),
        }
    }

    fn pause_all(&self) {
        self.shared.gate.pause();
        info!(pool = %self.shared.id, "workers paused");
    }

    fn resume_all(&self) {
        self.shared.gate.resume();
        info!(pool = %self.shared.id, "workers resumed");
    }

    fn drain(&self) {
        let mut set = self.lock_workers();
        if self.shared.draining.swap(true, Ordering::SeqCst) {
            return;
        }
        set.live = 0;
        info!(pool = %self.shared.id, queued = self.task_tx.len(), "pool draining");
    }

    async fn wait_until_idle(&self) -> EngineResult<()> {
        let mut running = self.shared.running.subscribe();
        running
            .wait_for(|running| *running == 0)
            .await
            .map_err(|_| EngineError::Closed)?;
        Ok(())
    }

    fn live_worker_count(&self) -> usize {
        self.lock_workers().live
    }

    fn stats(&self) -> PoolStats {
        let counters = &self.shared.counters;
        PoolStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            completed: counters.completed.load(Ordering::Relaxed),
            succeeded: counters.succeeded.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
            queued: self.task_tx.len(),
            queue_capacity: self.shared.config.queue_depth,
            live_workers: self.live_worker_count(),
            running_workers: self.shared.running_workers(),
            paused: self.shared.gate.is_paused(),
            draining: self.shared.is_draining(),
        }
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        // Release workers parked on the gate; they exit once the channels close.
        self.shared.gate.resume();
        debug!(pool = %self.shared.id, "worker pool dropped");
    }
}

/// Builds a [`WorkerPool`] for every new pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPoolFactory;

impl<T: Send + 'static> EngineFactory<T> for WorkerPoolFactory {
    fn build(&self, id: &PoolId, config: PoolConfig) -> EngineResult<Arc<dyn PoolEngine<T>>> {
        Ok(Arc::new(WorkerPool::new(id.clone(), config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use multipool_api::task_handler;

    fn test_pool(depth: usize) -> WorkerPool<u32> {
        WorkerPool::new(
            PoolId::new("test").unwrap(),
            PoolConfig {
                queue_depth: depth,
                idle_poll_interval: Duration::from_millis(5),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_new_pool_has_no_workers() {
        let pool = test_pool(4);
        assert_eq!(pool.live_worker_count(), 0);
        assert_eq!(pool.queue_capacity(), 4);
        assert_eq!(pool.id().as_str(), "test");
        pool.wait_until_idle().await.unwrap();
    }

    #[tokio::test]
    async fn test_processes_tasks() {
        let pool = test_pool(16);
        let sum = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&sum);
        pool.set_task_handler(task_handler(move |n: u32| {
            seen.fetch_add(n as usize, Ordering::SeqCst);
            n % 2 == 0
        }));
        pool.resize_workers_by(2).unwrap();

        for n in 1..=10 {
            pool.enqueue(n).await.unwrap();
        }
        pool.drain();
        tokio::time::timeout(Duration::from_secs(5), pool.wait_until_idle())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sum.load(Ordering::SeqCst), 55);
        let stats = pool.stats();
        assert_eq!(stats.submitted, 10);
        assert_eq!(stats.completed, 10);
        assert_eq!(stats.succeeded, 5);
        assert_eq!(stats.failed, 5);
        assert!(stats.is_idle());
    }

    #[test]
    fn test_rejects_non_positive_deltas() {
        let pool = test_pool(1);
        assert!(matches!(pool.resize_workers_by(0), Err(EngineError::InvalidAmount(0))));
        assert!(matches!(pool.resize_workers_by(-2), Err(EngineError::InvalidAmount(-2))));
        assert!(matches!(pool.kill_workers(-1), Err(EngineError::InvalidAmount(-1))));
    }

    #[tokio::test]
    async fn test_kill_bounds() {
        let pool = test_pool(1);
        pool.set_worker_count(2).unwrap();
        assert!(matches!(
            pool.kill_workers(3),
            Err(EngineError::ExcessiveKillAmount { requested: 3, live: 2 })
        ));
        assert_eq!(pool.live_worker_count(), 2);

        pool.kill_workers(2).unwrap();
        assert_eq!(pool.live_worker_count(), 0);
        tokio::time::timeout(Duration::from_secs(5), pool.wait_until_idle())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_worker_count_both_directions() {
        let pool = test_pool(1);
        pool.set_worker_count(3).unwrap();
        assert_eq!(pool.live_worker_count(), 3);
        pool.set_worker_count(1).unwrap();
        assert_eq!(pool.live_worker_count(), 1);
        pool.set_worker_count(1).unwrap();
        assert_eq!(pool.live_worker_count(), 1);
        pool.set_worker_count(0).unwrap();
        tokio::time::timeout(Duration::from_secs(5), pool.wait_until_idle())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_backpressure_reports_full_queue() {
        let pool = WorkerPool::new(
            PoolId::new("tiny").unwrap(),
            PoolConfig {
                queue_depth: 1,
                backpressure: BackpressureStrategy::Error,
                ..Default::default()
            },
        );
        pool.enqueue(1u32).await.unwrap();
        assert!(matches!(
            pool.enqueue(2).await,
            Err(EngineError::QueueFull { capacity: 1 })
        ));
        assert_eq!(pool.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_is_one_way() {
        let pool = test_pool(2);
        pool.drain();
        assert!(matches!(pool.enqueue(1).await, Err(EngineError::Closed)));
        assert!(matches!(pool.resize_workers_by(1), Err(EngineError::ResizeFailed(_))));
        assert!(pool.stats().draining);
    }

    #[tokio::test]
    async fn test_handler_panic_is_contained() {
        let pool = test_pool(4);
        pool.set_task_handler(task_handler(|n: u32| {
            if n == 0 {
                panic!("zero is not allowed");
            }
            true
        }));
        pool.resize_workers_by(1).unwrap();
        pool.enqueue(0).await.unwrap();
        pool.enqueue(1).await.unwrap();
        pool.drain();
        tokio::time::timeout(Duration::from_secs(5), pool.wait_until_idle())
            .await
            .unwrap()
            .unwrap();

        let stats = pool.stats();
        assert_eq!(stats.panicked, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test]
    async fn test_missing_handler_counts_failure() {
        let pool = test_pool(4);
        pool.resize_workers_by(1).unwrap();
        pool.enqueue(7).await.unwrap();
        pool.drain();
        tokio::time::timeout(Duration::from_secs(5), pool.wait_until_idle())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pool.stats().failed, 1);
        assert_eq!(pool.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_paused_pool_still_drains() {
        let pool = test_pool(4);
        pool.set_task_handler(task_handler(|_| true));
        pool.set_worker_count(3).unwrap();
        pool.pause_all();
        pool.drain();

        tokio::time::timeout(Duration::from_secs(5), pool.wait_until_idle())
            .await
            .unwrap()
            .unwrap();
        assert!(pool.stats().paused);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_accepted_tasks_survive_concurrent_drain() {
        for _ in 0..200 {
            let pool = Arc::new(test_pool(8));
            pool.set_task_handler(task_handler(|_| true));
            pool.resize_workers_by(1).unwrap();

            let sender = {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.enqueue(1).await.is_ok() })
            };
            let drainer = {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move { pool.drain() })
            };
            let accepted = sender.await.unwrap();
            drainer.await.unwrap();

            tokio::time::timeout(Duration::from_secs(5), pool.wait_until_idle())
                .await
                .unwrap()
                .unwrap();
            let stats = pool.stats();
            assert_eq!(stats.submitted, u64::from(accepted));
            assert_eq!(stats.completed, stats.submitted);
        }
    }
}
