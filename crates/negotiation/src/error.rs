//! Negotiation error types

use thiserror::Error;

/// Negotiation failure
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// Nothing to negotiate
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every superset was rejected
    #[error("no matching configuration found after {attempts} superset(s)")]
    NoMatch { attempts: usize },
}

/// Result alias
pub type Result<T> = std::result::Result<T, NegotiationError>;
