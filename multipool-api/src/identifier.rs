//! Pool identifiers.

use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;

use crate::errors::PoolError;

/// An opaque, caller-supplied pool name.
///
/// The name must contain something other than whitespace. It is stored exactly
/// as given, so `" jobs"` and `"jobs"` are distinct pools.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    /// Validates and wraps a raw identifier.
    pub fn new(raw: impl Into<String>) -> Result<Self, PoolError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(PoolError::EmptyIdentifier);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PoolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PoolId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for PoolId {
    type Error = PoolError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl TryFrom<String> for PoolId {
    type Error = PoolError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}
