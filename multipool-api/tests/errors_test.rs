use multipool_api::errors::{EngineError, PoolError};
use std::error::Error;
use anyhow::anyhow;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(PoolError::EmptyIdentifier.to_string(), "Pool identifier cannot be empty");
        assert_eq!(
            PoolError::InvalidQueueDepth(0).to_string(),
            "Queue depth has to be greater than 0 (got 0)"
        );
        assert_eq!(PoolError::ZeroAmount.to_string(), "Worker amount cannot be 0");
        assert_eq!(
            PoolError::NegativeAmount(-3).to_string(),
            "Worker amount has to be greater or equal to 0 (got -3)"
        );
        assert_eq!(PoolError::EmptyPayload.to_string(), "Task payload cannot be empty");
        assert_eq!(PoolError::EmptyRegistry.to_string(), "No pool has been declared");
    }

    #[test]
    fn test_existence_messages() {
        assert_eq!(
            PoolError::UnknownIdentifier("ghost".to_string()).to_string(),
            "Pool `ghost` does not exist"
        );
        assert_eq!(
            PoolError::DuplicateIdentifier("twice".to_string()).to_string(),
            "A pool with `twice` id already exists"
        );
        assert!(PoolError::UninitializedPool("bare".to_string())
            .to_string()
            .contains("bare"));
    }

    #[test]
    fn test_kill_amount_message() {
        let error = PoolError::ExcessiveKillAmount {
            pool: "p".to_string(),
            requested: 3,
            live: 2,
        };
        assert_eq!(
            error.to_string(),
            "Cannot kill 3 workers from pool `p`, only 2 are alive"
        );
        assert!(error.source().is_none());
    }

    #[test]
    fn test_engine_unavailable_keeps_source() {
        let error = PoolError::EngineUnavailable {
            pool: "p".to_string(),
            source: EngineError::Other(anyhow!("thread limit reached")),
        };
        assert!(error.is_engine());
        assert_eq!(
            error.source().map(|s| s.to_string()),
            Some("thread limit reached".to_string())
        );
    }

    #[test]
    fn test_engine_error_from_anyhow() {
        let error: EngineError = anyhow!("disk on fire").into();
        assert!(matches!(error, EngineError::Other(_)));
        assert_eq!(error.to_string(), "disk on fire");
        assert_eq!(EngineError::Closed.to_string(), "Pool engine is closed");
    }

    #[test]
    fn test_enqueue_mapping_keeps_every_engine_error() {
        for engine_error in [
            EngineError::Closed,
            EngineError::QueueFull { capacity: 1 },
            EngineError::InvalidAmount(-1),
        ] {
            let error = PoolError::from_enqueue("p", engine_error);
            assert!(matches!(error, PoolError::EnqueueFailed { .. }));
        }
    }
}
