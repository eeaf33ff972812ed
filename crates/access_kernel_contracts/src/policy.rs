#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::access_request::AccessRequestId;
use crate::{ContractViolation, Validate};

pub const POLICY_DOCUMENT_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyEffect {
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(rename = "Effect")]
    pub effect: PolicyEffect,
    #[serde(rename = "Action")]
    pub action: Vec<String>,
    #[serde(rename = "Resource")]
    pub resource: Vec<String>,
}

/// Descriptive permission artifact for an operator to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

impl PermissionDocument {
    pub fn allow_v1(action: Vec<String>, resource: Vec<String>) -> Self {
        Self {
            version: POLICY_DOCUMENT_VERSION.to_string(),
            statement: vec![PolicyStatement {
                effect: PolicyEffect::Allow,
                action,
                resource,
            }],
        }
    }
}

impl Validate for PermissionDocument {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.version != POLICY_DOCUMENT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "permission_document.version",
                reason: "must match POLICY_DOCUMENT_VERSION",
            });
        }
        if self.statement.len() != 1 {
            return Err(ContractViolation::InvalidValue {
                field: "permission_document.statement",
                reason: "must contain exactly one statement",
            });
        }
        Ok(())
    }
}

pub fn policy_filename(id: AccessRequestId) -> String {
    format!("policy-{id}.json")
}

pub fn policy_name(id: AccessRequestId) -> String {
    format!("access-{id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyExport {
    pub filename: String,
    pub document_json: String,
}
