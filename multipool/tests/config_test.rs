use std::time::Duration;

use multipool::logging::LogConfig;
use multipool::{BackpressureStrategy, ManagerConfig, PoolConfig, DEFAULT_QUEUE_DEPTH};

#[test]
fn test_manager_config_default_values() {
    let config = ManagerConfig::default();
    assert!(config.default_initial_workers >= 1);
    assert_eq!(config.default_queue_depth, DEFAULT_QUEUE_DEPTH);
    assert_eq!(config.thread_name_prefix, "multipool-");
}

#[test]
fn test_pool_config_matches_manager_defaults() {
    let manager = ManagerConfig::default();
    let derived = manager.pool_config(DEFAULT_QUEUE_DEPTH, false);
    let standalone = PoolConfig::default();

    assert_eq!(derived.queue_depth, standalone.queue_depth);
    assert_eq!(derived.backpressure, standalone.backpressure);
    assert_eq!(derived.idle_poll_interval, standalone.idle_poll_interval);
    assert_eq!(derived.thread_name_prefix, standalone.thread_name_prefix);
}

#[test]
fn test_pool_config_custom_values() {
    let manager = ManagerConfig {
        default_initial_workers: 2,
        default_queue_depth: 32,
        backpressure: BackpressureStrategy::Error,
        idle_poll_interval: Duration::from_millis(50),
        thread_name_prefix: "render-".to_string(),
    };
    let pool = manager.pool_config(4, true);

    assert_eq!(pool.queue_depth, 4);
    assert!(pool.verbose);
    assert_eq!(pool.backpressure, BackpressureStrategy::Error);
    assert_eq!(pool.idle_poll_interval, Duration::from_millis(50));
}

#[test]
fn test_log_config_override() {
    let config = LogConfig {
        json_format: true,
        show_file_line: false,
        ..Default::default()
    };
    assert!(config.json_format);
    assert!(!config.show_file_line);
    assert!(config.show_thread_info);
}
