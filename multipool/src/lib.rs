// Multipool Implementation
//
// This crate provides the pool orchestrator on top of the contracts in
// multipool-api, a thread-backed pool engine, and a recording mock engine for
// tests.

pub mod config;
pub mod engine;
pub mod logging;
pub mod manager;

// Re-export commonly used types
pub use config::ManagerConfig;
pub use engine::{WorkerPool, WorkerPoolFactory};
pub use manager::PoolManager;
pub use multipool_api::*;
