//! Point-in-time pool snapshots.

use std::time::Duration;

use serde::Serialize;

use crate::identifier::PoolId;

/// Counters reported by a pool engine.
///
/// Values are read independently, so a snapshot taken while workers are busy
/// may be off by the tasks in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Tasks accepted by the queue.
    pub submitted: u64,
    /// Tasks whose handler returned, successfully or not.
    pub completed: u64,
    /// Tasks whose handler returned `true`.
    pub succeeded: u64,
    /// Tasks whose handler returned `false`, panicked, or had no handler.
    pub failed: u64,
    /// Tasks whose handler panicked.
    pub panicked: u64,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Maximum queue depth.
    pub queue_capacity: usize,
    /// Target worker count.
    pub live_workers: usize,
    /// Worker threads that have not exited yet.
    pub running_workers: usize,
    pub paused: bool,
    pub draining: bool,
}

impl PoolStats {
    /// Returns true once no worker is running.
    pub fn is_idle(&self) -> bool {
        self.running_workers == 0
    }
}

/// Orchestrator-side description of one registered pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolInfo {
    pub id: PoolId,
    /// Worker count applied by `start`, if one was recorded.
    pub initial_workers: Option<usize>,
    pub handler_set: bool,
    /// Time since the pool was registered.
    pub uptime: Duration,
    pub stats: PoolStats,
}
