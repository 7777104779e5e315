//! # Multipool API
//!
//! Abstract contracts for running several independently configured worker
//! pools side by side. An orchestrator owns a registry of named pools and
//! delegates all real work to a pool engine through the [`PoolEngine`] trait,
//! so production engines and test doubles are interchangeable.
//!
//! ## Core Components
//!
//! - **Pool identifiers**: validated, caller-supplied names ([`PoolId`])
//! - **Payloads**: task data with an explicit "empty" sentinel ([`Payload`])
//! - **Task handlers**: the single function a pool invokes per task ([`TaskHandler`])
//! - **Engines**: the capability set an orchestrator consumes ([`PoolEngine`], [`EngineFactory`])
//! - **Snapshots**: point-in-time pool statistics ([`PoolStats`], [`PoolInfo`])
//! - **Errors**: the orchestrator and engine error taxonomy ([`PoolError`], [`EngineError`])
//!
//! ## Usage Example
//!
//! ```rust
//! use multipool_api::{PoolId, Payload, task_handler};
//!
//! let id = PoolId::new("thumbnails").unwrap();
//! assert_eq!(id.as_str(), "thumbnails");
//!
//! assert!(String::new().is_empty_payload());
//! assert!(!"resize:42".is_empty_payload());
//!
//! let handler = task_handler(|job: String| !job.is_empty());
//! assert!(handler("resize:42".to_string()));
//! ```
//!
//! ## Module Organization
//!
//! - [`engine`]: Pool engine and engine factory traits
//! - [`errors`]: Error types and handling
//! - [`identifier`]: Pool identifier validation
//! - [`payload`]: Task payloads and handlers
//! - [`stats`]: Pool statistics snapshots

pub mod engine;
pub mod errors;
pub mod identifier;
pub mod payload;
pub mod stats;

pub use engine::{BackpressureStrategy, EngineFactory, PoolConfig, PoolEngine, DEFAULT_QUEUE_DEPTH};
pub use errors::{EngineError, EngineResult, PoolError, PoolResult};
pub use identifier::PoolId;
pub use payload::{task_handler, Payload, TaskHandler};
pub use stats::{PoolInfo, PoolStats};
