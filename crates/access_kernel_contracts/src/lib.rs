#![forbid(unsafe_code)]

pub mod access_request;
pub mod common;
pub mod intake;
pub mod policy;

pub use common::{
    ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate, NS_PER_HOUR,
    NS_PER_MINUTE, NS_PER_SECOND,
};
