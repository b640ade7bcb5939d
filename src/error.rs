//! Error types for NetApp operations
//!
//! Validation errors are raised locally before anything is sent to Azure.
//! Submission and completion errors wrap the underlying transport error and
//! name the action that failed. Convergence errors come from the resource waits.

use crate::azure::lro::OperationAborted;
use thiserror::Error;

/// Request rejected locally, before any remote call
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("at least one protocol type is required")]
    NoProtocolTypes,

    #[error("maximum of two protocol types are supported")]
    TooManyProtocolTypes,

    #[error("only cifs/nfsv3 protocol types are supported as dual protocol")]
    UnsupportedDualProtocol,

    #[error("invalid protocol type {value:?}, valid protocol types are: [{valid}]")]
    InvalidProtocolType { value: String, valid: String },

    #[error("invalid service level {value:?}, supported service levels are: [{valid}]")]
    InvalidServiceLevel { value: String, valid: String },

    #[error("{field} is required")]
    MissingField { field: &'static str },
}

/// Errors surfaced by the NetApp gateway and the convergence waits
#[derive(Debug, Error)]
pub enum NetAppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Azure refused the request itself
    #[error("cannot {action}: {source:#}")]
    Submission {
        action: &'static str,
        source: anyhow::Error,
    },

    /// The request was accepted but the long-running operation failed
    #[error("cannot get the {action} response: {source:#}")]
    Completion {
        action: &'static str,
        source: anyhow::Error,
    },

    /// The resource kept answering after deletion
    #[error("exceeded number of retries: {retries}")]
    RetriesExceeded { retries: u32 },

    /// The resource never became reachable after creation
    #[error("resource still not found after number of retries: {retries}, error: {last_error}")]
    ResourceNotReady { retries: u32, last_error: String },

    #[error("wait for {resource_id} was aborted")]
    Aborted { resource_id: String },

    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

impl NetAppError {
    pub(crate) fn submission(action: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Submission { action, source }
    }

    pub(crate) fn completion(action: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::Completion { action, source }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether the caller's abort signal ended the call
    pub fn is_aborted(&self) -> bool {
        match self {
            Self::Aborted { .. } => true,
            Self::Completion { source, .. } => source.is::<OperationAborted>(),
            _ => false,
        }
    }
}

pub type Result<T, E = NetAppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_message_names_action() {
        let err = NetAppError::submission("create volume")(anyhow::anyhow!("API request failed: 400"));
        assert_eq!(err.to_string(), "cannot create volume: API request failed: 400");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_completion_message_includes_context_chain() {
        let source = anyhow::anyhow!("Failed").context("operation finished with status Failed");
        let err = NetAppError::completion("pool create or update")(source);
        assert_eq!(
            err.to_string(),
            "cannot get the pool create or update response: operation finished with status Failed: Failed"
        );
    }

    #[test]
    fn test_aborted_completion() {
        let err = NetAppError::completion("volume delete")(OperationAborted.into());
        assert!(err.is_aborted());
        assert_eq!(err.to_string(), "cannot get the volume delete response: operation polling was aborted");

        let err = NetAppError::completion("volume delete")(anyhow::anyhow!("Failed"));
        assert!(!err.is_aborted());
    }

    #[test]
    fn test_validation_converts() {
        let err: NetAppError = ValidationError::TooManyProtocolTypes.into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "maximum of two protocol types are supported");
    }
}
