//! # Pool Engines
//!
//! Implementations of [`PoolEngine`](multipool_api::PoolEngine), the runtime of
//! a single named pool.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    WorkerPool<T>                     │
//! ├──────────────────────────────────────────────────────┤
//! │  enqueue() ──▶ flume::bounded(queue_depth)           │
//! │                      │                               │
//! │      ┌───────────────┼───────────────┐               │
//! │  ┌───▼────┐      ┌───▼────┐      ┌───▼────┐          │
//! │  │worker-0│      │worker-1│      │worker-n│  threads │
//! │  └───▲────┘      └───▲────┘      └───▲────┘          │
//! │      └───── kill tokens / pause gate ┘               │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! - [`WorkerPool`]: production engine backed by OS threads
//! - [`WorkerPoolFactory`]: builds a `WorkerPool` per registered pool
//! - [`mock`]: a recording test double behind the same trait

pub mod mock;
mod pool;
mod worker;

pub use mock::{MockCall, MockEngine, MockEngineFactory};
pub use pool::{WorkerPool, WorkerPoolFactory};
