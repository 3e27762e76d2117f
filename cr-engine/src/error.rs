//! Domain error type for the CR state engine.
//!
//! Mirrors the plain enum + hand-written `Display` style used elsewhere in
//! this codebase for recoverable domain errors (mempool rejection reasons)
//! rather than reaching for a derive macro.

use std::fmt;

/// Errors the engine can construct. `NotFound` is intentionally absent —
/// lookups return `Option`/`None`, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// `rollback_to` was asked to unwind past the oldest retained history
    /// batch.
    InsufficientHistory { requested: u32, oldest_retained: u32 },
    /// A public key failed to decode into a valid identity input.
    MalformedKey(String),
    /// A redeem script was empty or otherwise could not be parsed.
    MalformedCode(String),
    /// A defensive consistency check failed while processing a
    /// transaction; the transaction was abandoned.
    InvariantViolation(String),
    /// The engine's internal lock was poisoned by a panicking holder.
    Poisoned,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InsufficientHistory { requested, oldest_retained } => write!(
                f,
                "cannot roll back to height {}: oldest retained height is {}",
                requested, oldest_retained
            ),
            EngineError::MalformedKey(msg) => write!(f, "malformed public key: {}", msg),
            EngineError::MalformedCode(msg) => write!(f, "malformed redeem script: {}", msg),
            EngineError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
            EngineError::Poisoned => write!(f, "engine lock poisoned by a panicking holder"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;
