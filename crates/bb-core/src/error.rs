//! # AppError
//!
//! Centralized error handling for the bulletin board.
//! Maps store and domain failures to actionable error types.

use crate::models::AdId;
use thiserror::Error;

/// The primary error type for all bb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., an ad id that was never created)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty author or title)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The key-value store could not be reached or refused the command
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// A stored value did not decode into a well-formed ad
    #[error("corrupt record at key {key}: {reason}")]
    DataCorruption { key: String, reason: String },

    /// Retries against concurrent writers were exhausted
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invariant failure inside the core (e.g., id space exhausted)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn ad_not_found(id: AdId) -> Self {
        Self::NotFound("ad".to_string(), id.to_string())
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(..))
    }
}

/// A specialized Result type for bulletin board logic.
pub type Result<T> = std::result::Result<T, AppError>;
