#![forbid(unsafe_code)]

use access_engines::interpret::InterpretTransportError;
use access_engines::policy::PolicySynthesisError;
use access_kernel_contracts::access_request::{
    AccessRequestAction, AccessRequestId, AccessRequestStatus,
};
use access_kernel_contracts::ContractViolation;
use access_storage::StorageError;
use thiserror::Error;

/// Client-facing failure taxonomy for every workflow operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("access request {id} not found")]
    NotFound { id: AccessRequestId },
    #[error("cannot {action} access request {id}: current status is {current}")]
    InvalidTransition {
        id: AccessRequestId,
        action: AccessRequestAction,
        current: AccessRequestStatus,
    },
    #[error("precondition failed: {detail}")]
    PreconditionFailed { detail: String },
    #[error("interpretation incomplete; missing {}", .missing.join(", "))]
    IncompleteInterpretation { missing: Vec<&'static str> },
    /// The collaborator answered every field, but with values creation refuses.
    #[error("interpretation returned unusable data: {violation}")]
    InvalidInterpretation { violation: ContractViolation },
    #[error(transparent)]
    TransportFailure(#[from] InterpretTransportError),
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ContractViolation),
    #[error("storage failure: {0}")]
    Storage(StorageError),
    #[error("internal failure: {detail}")]
    Internal { detail: String },
}

impl AccessError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ACCESS_NOT_FOUND",
            Self::InvalidTransition { .. } => "ACCESS_INVALID_TRANSITION",
            Self::PreconditionFailed { .. } => "ACCESS_PRECONDITION_FAILED",
            Self::IncompleteInterpretation { .. } => "ACCESS_INCOMPLETE_INTERPRETATION",
            Self::InvalidInterpretation { .. } => "ACCESS_INVALID_INTERPRETATION",
            Self::TransportFailure(_) => "ACCESS_TRANSPORT_FAILURE",
            Self::InvalidInput(_) => "ACCESS_INVALID_INPUT",
            Self::Storage(_) => "ACCESS_STORAGE",
            Self::Internal { .. } => "ACCESS_INTERNAL",
        }
    }
}

impl From<StorageError> for AccessError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ContractViolation(v) => Self::InvalidInput(v),
            other => Self::Storage(other),
        }
    }
}

impl From<PolicySynthesisError> for AccessError {
    fn from(e: PolicySynthesisError) -> Self {
        match e {
            PolicySynthesisError::NotApproved { .. } | PolicySynthesisError::Expired { .. } => {
                Self::PreconditionFailed {
                    detail: e.to_string(),
                }
            }
            PolicySynthesisError::ContractViolation(v) => Self::InvalidInput(v),
            PolicySynthesisError::Encode(err) => Self::Internal {
                detail: err.to_string(),
            },
        }
    }
}
