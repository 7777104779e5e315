//! # Task Payloads and Handlers
//!
//! Every pool processes one payload type `T`. A payload type declares which of
//! its values counts as "empty" so the orchestrator can refuse to enqueue
//! meaningless tasks. Value types with no empty state simply never report one.

use std::sync::Arc;

/// The function a pool invokes once per dequeued task.
///
/// The boolean is the task outcome. Engines use it for success/failure
/// accounting and attach no other meaning to it.
pub type TaskHandler<T> = Arc<dyn Fn(T) -> bool + Send + Sync>;

/// Wraps a closure into a shareable [`TaskHandler`].
pub fn task_handler<T, F>(f: F) -> TaskHandler<T>
where
    F: Fn(T) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Task data accepted by a pool.
pub trait Payload {
    /// Returns true if this value is the empty sentinel for its type.
    fn is_empty_payload(&self) -> bool;
}

impl<U> Payload for Option<U> {
    fn is_empty_payload(&self) -> bool {
        self.is_none()
    }
}

impl Payload for String {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl Payload for &str {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl<U> Payload for Vec<U> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl<U> Payload for [U] {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl Payload for str {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl<U: Payload + ?Sized> Payload for Box<U> {
    fn is_empty_payload(&self) -> bool {
        (**self).is_empty_payload()
    }
}

impl<U: Payload + ?Sized> Payload for Arc<U> {
    fn is_empty_payload(&self) -> bool {
        (**self).is_empty_payload()
    }
}

impl Payload for serde_json::Value {
    fn is_empty_payload(&self) -> bool {
        self.is_null()
    }
}

macro_rules! never_empty {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Payload for $ty {
                fn is_empty_payload(&self) -> bool {
                    false
                }
            }
        )*
    };
}

never_empty!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, ()
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_sentinels() {
        assert!(None::<u32>.is_empty_payload());
        assert!(!Some(0u32).is_empty_payload());
        assert!(String::new().is_empty_payload());
        assert!("".is_empty_payload());
        assert!(Vec::<u8>::new().is_empty_payload());
        assert!(json!(null).is_empty_payload());
        assert!(!json!({"job": 1}).is_empty_payload());
    }

    #[test]
    fn test_smart_pointers_delegate() {
        assert!(Box::new(String::new()).is_empty_payload());
        assert!(!Arc::new("x".to_string()).is_empty_payload());
        let slice: Box<[u8]> = Vec::new().into_boxed_slice();
        assert!(slice.is_empty_payload());
    }

    #[test]
    fn test_value_types_are_never_empty() {
        assert!(!0i64.is_empty_payload());
        assert!(!false.is_empty_payload());
        assert!(!().is_empty_payload());
    }

    #[test]
    fn test_task_handler_is_shared() {
        let handler = task_handler(|n: u32| n % 2 == 0);
        let shared = Arc::clone(&handler);
        assert!(handler(4));
        assert!(!shared(3));
        assert_eq!(Arc::strong_count(&handler), 2);
    }
}
