//! Pipeline error types

use contracts::{ContractError, ModuleUid, PipelineState};
use negotiation::NegotiationError;
use thiserror::Error;

/// Lifecycle errors returned by [`crate::Pipeline`]
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Operation not permitted in the current state
    #[error("{operation} is not allowed while {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Module already registered (same instance or same uid)
    #[error("module {module_uid} is already registered")]
    Duplicate { module_uid: ModuleUid },

    /// No superset could be applied to the device and every module
    #[error("no configuration satisfies the device and every module ({attempts} tried)")]
    NoMatch { attempts: usize },

    #[error("device failure: {0}")]
    DeviceFailure(#[source] ContractError),

    /// A module consumer could not be set up
    #[error("module {module_uid} failure: {message}")]
    ModuleFailure {
        module_uid: ModuleUid,
        message: String,
    },

    #[error("failed to create context")]
    ContextCreation(#[source] ContractError),
}

impl PipelineError {
    pub fn invalid_state(operation: &'static str, state: PipelineState) -> Self {
        Self::InvalidState { operation, state }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<NegotiationError> for PipelineError {
    fn from(e: NegotiationError) -> Self {
        match e {
            NegotiationError::InvalidArgument(message) => Self::InvalidArgument(message),
            NegotiationError::NoMatch { attempts } => Self::NoMatch { attempts },
        }
    }
}

/// Pipeline Result type alias
pub type Result<T> = std::result::Result<T, PipelineError>;
