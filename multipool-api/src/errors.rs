//! # Pool Error Types
//!
//! This module defines the error types shared by pool orchestrators and pool
//! engines.
//!
//! Errors fall into three groups:
//! - Validation: malformed input rejected before any delegation
//! - Existence: the referenced pool identifier is missing or already taken
//! - Delegated: the engine rejected an otherwise well-formed request
//!
//! No error is fatal to the orchestrator. A failed operation on one pool leaves
//! the registry and every other pool untouched.
//!
//! ## Usage Example
//!
//! ```rust
//! use multipool_api::errors::PoolError;
//!
//! fn describe(error: &PoolError) -> &'static str {
//!     if error.is_validation() {
//!         "bad input"
//!     } else if error.is_not_found() {
//!         "no such pool"
//!     } else {
//!         "engine refused"
//!     }
//! }
//!
//! assert_eq!(describe(&PoolError::ZeroAmount), "bad input");
//! ```

use thiserror::Error;

/// Errors reported by the pool orchestrator.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool identifier is empty or only whitespace.
    #[error("Pool identifier cannot be empty")]
    EmptyIdentifier,

    /// The requested queue depth is below one.
    #[error("Queue depth has to be greater than 0 (got {0})")]
    InvalidQueueDepth(usize),

    /// A worker delta of zero was requested.
    #[error("Worker amount cannot be 0")]
    ZeroAmount,

    /// A negative absolute worker count was requested.
    #[error("Worker amount has to be greater or equal to 0 (got {0})")]
    NegativeAmount(i64),

    /// The submitted payload is the empty value for its type.
    #[error("Task payload cannot be empty")]
    EmptyPayload,

    /// A registry-wide operation was requested with no pools registered.
    #[error("No pool has been declared")]
    EmptyRegistry,

    /// No pool is registered under the identifier.
    #[error("Pool `{0}` does not exist")]
    UnknownIdentifier(String),

    /// A pool is already registered under the identifier.
    #[error("A pool with `{0}` id already exists")]
    DuplicateIdentifier(String),

    /// The pool has no recorded initial worker count to start with.
    #[error("Pool `{0}` has no initial worker count to start with")]
    UninitializedPool(String),

    /// The engine could not change its worker count.
    #[error("Failed to resize pool `{pool}`: {reason}")]
    ResizeFailed { pool: String, reason: String },

    /// More workers were asked to stop than the pool has.
    #[error("Cannot kill {requested} workers from pool `{pool}`, only {live} are alive")]
    ExcessiveKillAmount {
        pool: String,
        requested: i64,
        live: usize,
    },

    /// The engine refused to enqueue the task.
    #[error("Failed to enqueue task on pool `{pool}`: {source}")]
    EnqueueFailed {
        pool: String,
        #[source]
        source: EngineError,
    },

    /// The engine factory could not build an engine for a new pool.
    #[error("Failed to build engine for pool `{pool}`: {source}")]
    EngineUnavailable {
        pool: String,
        #[source]
        source: EngineError,
    },
}

impl PoolError {
    /// Returns true for errors caught before any delegation to an engine.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PoolError::EmptyIdentifier
                | PoolError::InvalidQueueDepth(_)
                | PoolError::ZeroAmount
                | PoolError::NegativeAmount(_)
                | PoolError::EmptyPayload
                | PoolError::EmptyRegistry
        )
    }

    /// Returns true when the operation referenced a missing pool.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PoolError::UnknownIdentifier(_))
    }

    /// Returns true when the engine rejected the request.
    pub fn is_engine(&self) -> bool {
        matches!(
            self,
            PoolError::ResizeFailed { .. }
                | PoolError::ExcessiveKillAmount { .. }
                | PoolError::EnqueueFailed { .. }
                | PoolError::EngineUnavailable { .. }
        )
    }

    /// Translates an engine error raised while resizing `pool`.
    pub fn from_resize(pool: impl Into<String>, error: EngineError) -> Self {
        let pool = pool.into();
        match error {
            EngineError::ExcessiveKillAmount { requested, live } => PoolError::ExcessiveKillAmount {
                pool,
                requested,
                live,
            },
            other => PoolError::ResizeFailed {
                pool,
                reason: other.to_string(),
            },
        }
    }

    /// Translates an engine error raised while enqueueing on `pool`.
    pub fn from_enqueue(pool: impl Into<String>, error: EngineError) -> Self {
        PoolError::EnqueueFailed {
            pool: pool.into(),
            source: error,
        }
    }
}

/// Errors reported by a pool engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Workers could not be created or the resize was refused.
    #[error("Resize failed: {0}")]
    ResizeFailed(String),

    /// More workers were asked to stop than are alive.
    #[error("Cannot kill {requested} workers, only {live} are alive")]
    ExcessiveKillAmount { requested: i64, live: usize },

    /// A worker delta outside the accepted range.
    #[error("Invalid worker amount: {0}")]
    InvalidAmount(i64),

    /// The task queue is at capacity and the engine does not block.
    #[error("Task queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },

    /// The engine no longer accepts work.
    #[error("Pool engine is closed")]
    Closed,

    /// Catch-all for other engine failures.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for orchestrator operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
