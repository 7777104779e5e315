use std::time::Duration;

use multipool_api::engine::{BackpressureStrategy, PoolConfig, DEFAULT_QUEUE_DEPTH};

/// Configuration for a [`PoolManager`](crate::manager::PoolManager).
///
/// Per-pool values passed to `create` take precedence. Everything else falls
/// back to these defaults.
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Initial worker count used by `create_with_defaults`.
    pub default_initial_workers: usize,

    /// Queue depth used by `create_with_defaults`.
    pub default_queue_depth: usize,

    /// What `submit` does when a pool's queue is full.
    pub backpressure: BackpressureStrategy,

    /// How often idle workers re-check pause and drain state.
    pub idle_poll_interval: Duration,

    /// Prefix for worker thread names, followed by `<pool>-<n>`.
    pub thread_name_prefix: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_initial_workers: num_cpus::get(),
            default_queue_depth: DEFAULT_QUEUE_DEPTH,
            backpressure: BackpressureStrategy::Block,
            idle_poll_interval: Duration::from_millis(10),
            thread_name_prefix: "multipool-".to_string(),
        }
    }
}

impl ManagerConfig {
    /// Builds the engine configuration for one pool.
    pub fn pool_config(&self, queue_depth: usize, verbose: bool) -> PoolConfig {
        PoolConfig {
            queue_depth,
            verbose,
            backpressure: self.backpressure,
            idle_poll_interval: self.idle_poll_interval,
            thread_name_prefix: self.thread_name_prefix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_config_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.default_initial_workers, num_cpus::get());
        assert_eq!(config.default_queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.backpressure, BackpressureStrategy::Block);
        assert_eq!(config.idle_poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_pool_config_merges_defaults() {
        let config = ManagerConfig {
            backpressure: BackpressureStrategy::Error,
            thread_name_prefix: "jobs-".to_string(),
            ..Default::default()
        };
        let pool = config.pool_config(8, true);
        assert_eq!(pool.queue_depth, 8);
        assert!(pool.verbose);
        assert_eq!(pool.backpressure, BackpressureStrategy::Error);
        assert_eq!(pool.thread_name_prefix, "jobs-");
    }
}
