//! # Worker Threads
//!
//! One worker is one OS thread pulling tasks from its pool's bounded queue.
//!
//! ## Core Algorithm
//! 1. Block on a selector over the kill channel, the task queue, and a poll
//!    timeout
//! 2. A kill token ends the loop; it is only observed between tasks, so kills
//!    are graceful
//! 3. A task is held until the pool is resumed, then passed to the handler
//! 4. On timeout, re-check pause and drain state
//!
//! A panicking handler is caught and counted as a failed task. The worker keeps
//! running.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{Receiver, Selector, TryRecvError};
use tokio::sync::watch;
use tracing::{error, trace, warn};

use multipool_api::{PoolConfig, PoolId, TaskHandler};

/// Blocks workers while their pool is paused.
#[derive(Debug, Default)]
pub(crate) struct PauseGate {
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl PauseGate {
    pub(crate) fn pause(&self) {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub(crate) fn resume(&self) {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.resumed.notify_all();
    }

    pub(crate) fn is_paused(&self) -> bool {
        *self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits up to `timeout` for a resume.
    fn wait_timeout(&self, timeout: Duration) {
        let guard = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .resumed
            .wait_timeout_while(guard, timeout, |paused| *paused)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn wait_while_paused(&self) {
        let guard = self.paused.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .resumed
            .wait_while(guard, |paused| *paused)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Task outcome counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) succeeded: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) panicked: AtomicU64,
}

/// State shared by a pool and all of its workers.
pub(crate) struct PoolShared<T> {
    pub(crate) id: PoolId,
    pub(crate) config: PoolConfig,
    pub(crate) tasks: Receiver<T>,
    pub(crate) kills: Receiver<()>,
    pub(crate) handler: RwLock<Option<TaskHandler<T>>>,
    pub(crate) gate: PauseGate,
    pub(crate) draining: AtomicBool,
    /// Enqueue calls that passed the drain check and may still be sending.
    pub(crate) enqueuing: AtomicUsize,
    pub(crate) counters: Counters,
    /// Number of worker threads that have not exited yet.
    pub(crate) running: watch::Sender<usize>,
    pub(crate) dispatch: tracing::Dispatch,
}

impl<T> PoolShared<T> {
    pub(crate) fn running_workers(&self) -> usize {
        *self.running.borrow()
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// True once draining, with no enqueue in flight and an empty queue.
    ///
    /// `enqueuing` is read before the queue so a send that finished in between
    /// is still seen.
    fn can_retire(&self) -> bool {
        self.is_draining() && self.enqueuing.load(Ordering::SeqCst) == 0 && self.tasks.is_empty()
    }

    fn current_handler(&self) -> Option<TaskHandler<T>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    /// Consumed a kill token.
    Killed,
    /// The pool is draining and the queue is empty.
    Drained,
    /// The pool dropped its channels.
    Disconnected,
}

enum Event<T> {
    Kill,
    Task(T),
    Closed,
}

/// Decrements the running count however the worker thread ends.
struct RunningGuard<'a>(&'a watch::Sender<usize>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|running| *running = running.saturating_sub(1));
    }
}

pub(crate) struct Worker<T> {
    id: usize,
    shared: Arc<PoolShared<T>>,
}

impl<T: Send + 'static> Worker<T> {
    pub(crate) fn new(id: usize, shared: Arc<PoolShared<T>>) -> Self {
        Self { id, shared }
    }

    /// Starts the worker thread.
    ///
    /// The running count is raised before the thread starts so a concurrent
    /// `wait_until_idle` never observes a spawned-but-unregistered worker.
    pub(crate) fn spawn(self) -> io::Result<JoinHandle<()>> {
        let name = format!(
            "{}{}-{}",
            self.shared.config.thread_name_prefix, self.shared.id, self.id
        );
        self.shared.running.send_modify(|running| *running += 1);
        let shared = Arc::clone(&self.shared);

        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let dispatch = self.shared.dispatch.clone();
                tracing::dispatcher::with_default(&dispatch, || self.run())
            })
            .inspect_err(|_| {
                shared
                    .running
                    .send_modify(|running| *running = running.saturating_sub(1))
            })
    }

    fn run(self) {
        let shared = &self.shared;
        let _running = RunningGuard(&shared.running);
        let verbose = shared.config.verbose;

        crate::log_pool_event!(verbose, shared.id, "worker started", worker = self.id);
        let exit = self.run_loop();
        crate::log_pool_event!(verbose, shared.id, "worker stopped", worker = self.id, reason = ?exit);
    }

    fn run_loop(&self) -> WorkerExit {
        let shared = &self.shared;
        let poll = shared.config.idle_poll_interval;

        loop {
            if shared.gate.is_paused() {
                if shared.can_retire() {
                    return WorkerExit::Drained;
                }
                // Honour kills while paused without pulling new tasks.
                match shared.kills.try_recv() {
                    Ok(()) => return WorkerExit::Killed,
                    Err(TryRecvError::Disconnected) => return WorkerExit::Disconnected,
                    Err(TryRecvError::Empty) => shared.gate.wait_timeout(poll),
                }
                continue;
            }

            if shared.can_retire() {
                return WorkerExit::Drained;
            }

            let event = Selector::new()
                .recv(&shared.kills, |msg| match msg {
                    Ok(()) => Event::Kill,
                    Err(_) => Event::Closed,
                })
                .recv(&shared.tasks, |msg| match msg {
                    Ok(task) => Event::Task(task),
                    Err(_) => Event::Closed,
                })
                .wait_timeout(poll);

            match event {
                Ok(Event::Kill) => return WorkerExit::Killed,
                Ok(Event::Closed) => return WorkerExit::Disconnected,
                Ok(Event::Task(task)) => {
                    // Paused after the task was pulled: hold it until resume.
                    shared.gate.wait_while_paused();
                    self.process(task);
                }
                Err(_) => trace!(pool = %shared.id, worker = self.id, "idle"),
            }
        }
    }

    fn process(&self, task: T) {
        let shared = &self.shared;
        let counters = &shared.counters;

        let Some(handler) = shared.current_handler() else {
            warn!(pool = %shared.id, worker = self.id, "no task handler set, dropping task");
            counters.failed.fetch_add(1, Ordering::Relaxed);
            counters.completed.fetch_add(1, Ordering::Relaxed);
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| handler(task))) {
            Ok(true) => {
                counters.succeeded.fetch_add(1, Ordering::Relaxed);
                crate::log_pool_event!(shared.config.verbose, shared.id, "task succeeded", worker = self.id);
            }
            Ok(false) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                crate::log_pool_event!(shared.config.verbose, shared.id, "task failed", worker = self.id);
            }
            Err(panic_error) => {
                let message = panic_error
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic_error.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(pool = %shared.id, worker = self.id, panic = %message, "task handler panicked");
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        counters.completed.fetch_add(1, Ordering::Relaxed);
    }
}
