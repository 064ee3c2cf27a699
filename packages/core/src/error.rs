//! Cache Error Types
//!
//! This module defines the error types for cache operations. The cache has
//! almost no runtime error taxonomy: missing data is reported through the
//! `partial` flag of a denormalization, never as an error. What remains here
//! are malformed inputs that indicate a defect in the caller (selection IR
//! that references unknown fragments, response data that is not an object).

use thiserror::Error;

/// Cache operation errors
///
/// Returned before any storage mutation happens, so a failed write never
/// leaves a partially-applied patch behind.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A fragment spread names a fragment absent from the operation's fragment table
    #[error("Unknown fragment referenced by spread: {name}")]
    MissingFragment { name: String },

    /// A fragment spreads itself, directly or through other fragments
    #[error("Fragment spreads itself: {name}")]
    FragmentCycle { name: String },

    /// Response data is not shaped like an operation result
    #[error("Invalid response data: {0}")]
    InvalidResponse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Create a missing fragment error
    pub fn missing_fragment(name: impl Into<String>) -> Self {
        Self::MissingFragment { name: name.into() }
    }

    /// Create a fragment cycle error
    pub fn fragment_cycle(name: impl Into<String>) -> Self {
        Self::FragmentCycle { name: name.into() }
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether this error signals malformed selection IR (a codegen defect)
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingFragment { .. } | Self::FragmentCycle { .. }
        )
    }
}
