#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::validate_text;
use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const ACCESS_REQUEST_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Fallback applied by the direct-submission boundary when a caller omits the duration.
pub const DEFAULT_DURATION_HOURS: u32 = 24;
pub const MAX_DURATION_HOURS: u32 = 8_760;

const MAX_REQUESTER_LEN: usize = 256;
const MAX_ACCOUNT_LEN: usize = 256;
const MAX_REASON_LEN: usize = 2_048;
const MAX_SERVICE_TAG_LEN: usize = 64;
const MAX_RESOURCE_LEN: usize = 2_048;
const MAX_LIST_ENTRIES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessRequestId(u64);

impl AccessRequestId {
    pub fn new(v: u64) -> Result<Self, ContractViolation> {
        let id = Self(v);
        id.validate()?;
        Ok(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Validate for AccessRequestId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "access_request_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for AccessRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessRequestStatus {
    Created,
    ManagerApproved,
    ManagerRejected,
    DevopsApproved,
    DevopsRejected,
    Expired,
}

impl AccessRequestStatus {
    pub const ALL: [AccessRequestStatus; 6] = [
        AccessRequestStatus::Created,
        AccessRequestStatus::ManagerApproved,
        AccessRequestStatus::ManagerRejected,
        AccessRequestStatus::DevopsApproved,
        AccessRequestStatus::DevopsRejected,
        AccessRequestStatus::Expired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessRequestStatus::Created => "CREATED",
            AccessRequestStatus::ManagerApproved => "MANAGER_APPROVED",
            AccessRequestStatus::ManagerRejected => "MANAGER_REJECTED",
            AccessRequestStatus::DevopsApproved => "DEVOPS_APPROVED",
            AccessRequestStatus::DevopsRejected => "DEVOPS_REJECTED",
            AccessRequestStatus::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for AccessRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalStage {
    Manager,
    Devops,
}

impl ApprovalStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStage::Manager => "manager",
            ApprovalStage::Devops => "devops",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessRequestAction {
    Create,
    ManagerApprove,
    ManagerReject,
    DevopsApprove,
    DevopsReject,
    Expire,
}

impl AccessRequestAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessRequestAction::Create => "create",
            AccessRequestAction::ManagerApprove => "manager.approve",
            AccessRequestAction::ManagerReject => "manager.reject",
            AccessRequestAction::DevopsApprove => "devops.approve",
            AccessRequestAction::DevopsReject => "devops.reject",
            AccessRequestAction::Expire => "expire",
        }
    }

    pub fn stage(self) -> Option<ApprovalStage> {
        match self {
            AccessRequestAction::ManagerApprove | AccessRequestAction::ManagerReject => {
                Some(ApprovalStage::Manager)
            }
            AccessRequestAction::DevopsApprove | AccessRequestAction::DevopsReject => {
                Some(ApprovalStage::Devops)
            }
            AccessRequestAction::Create | AccessRequestAction::Expire => None,
        }
    }
}

impl fmt::Display for AccessRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproverStamp {
    pub approver: String,
    pub decided_at: MonotonicTimeNs,
}

impl ApproverStamp {
    pub fn v1(approver: String, decided_at: MonotonicTimeNs) -> Result<Self, ContractViolation> {
        let s = Self {
            approver,
            decided_at,
        };
        s.validate()?;
        Ok(s)
    }
}

impl Validate for ApproverStamp {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("approver_stamp.approver", &self.approver, MAX_REQUESTER_LEN)?;
        if self.decided_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "approver_stamp.decided_at",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// Trims, upper-cases and de-duplicates service tags, keeping first-seen order.
pub fn normalize_service_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_ascii_uppercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

pub fn normalize_resources<I, S>(resources: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for resource in resources {
        let resource = resource.as_ref().trim();
        if !resource.is_empty() && !out.iter().any(|r| r == resource) {
            out.push(resource.to_string());
        }
    }
    out
}

fn validate_duration_hours(field: &'static str, hours: u32) -> Result<(), ContractViolation> {
    if !(1..=MAX_DURATION_HOURS).contains(&hours) {
        return Err(ContractViolation::InvalidRange {
            field,
            min: 1,
            max: u64::from(MAX_DURATION_HOURS),
            got: u64::from(hours),
        });
    }
    Ok(())
}

fn validate_tag_list(
    field: &'static str,
    entries: &[String],
    max_entry_len: usize,
) -> Result<(), ContractViolation> {
    if entries.len() > MAX_LIST_ENTRIES {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "too many entries",
        });
    }
    for entry in entries {
        validate_text(field, entry, max_entry_len)?;
    }
    Ok(())
}

/// Strongly-typed creation input shared by direct submission and intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequestCreateInput {
    pub requester: String,
    pub account: String,
    pub reason: String,
    pub services: Vec<String>,
    pub resources: Vec<String>,
    pub duration_hours: u32,
}

impl AccessRequestCreateInput {
    pub fn v1(
        requester: impl Into<String>,
        account: impl Into<String>,
        reason: impl Into<String>,
        services: Vec<String>,
        resources: Vec<String>,
        duration_hours: u32,
    ) -> Result<Self, ContractViolation> {
        let input = Self {
            requester: requester.into().trim().to_string(),
            account: account.into().trim().to_string(),
            reason: reason.into().trim().to_string(),
            services: normalize_service_tags(services),
            resources: normalize_resources(resources),
            duration_hours,
        };
        input.validate()?;
        Ok(input)
    }
}

impl Validate for AccessRequestCreateInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text(
            "access_request_create_input.requester",
            &self.requester,
            MAX_REQUESTER_LEN,
        )?;
        validate_text(
            "access_request_create_input.account",
            &self.account,
            MAX_ACCOUNT_LEN,
        )?;
        validate_text(
            "access_request_create_input.reason",
            &self.reason,
            MAX_REASON_LEN,
        )?;
        validate_tag_list(
            "access_request_create_input.services",
            &self.services,
            MAX_SERVICE_TAG_LEN,
        )?;
        validate_tag_list(
            "access_request_create_input.resources",
            &self.resources,
            MAX_RESOURCE_LEN,
        )?;
        validate_duration_hours(
            "access_request_create_input.duration_hours",
            self.duration_hours,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestRecord {
    pub schema_version: SchemaVersion,
    pub id: AccessRequestId,
    pub requester: String,
    pub account: String,
    pub reason: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub resources: Vec<String>,
    pub duration_hours: u32,
    pub status: AccessRequestStatus,
    pub created_at: MonotonicTimeNs,
    pub expires_at: MonotonicTimeNs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_decision: Option<ApproverStamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devops_decision: Option<ApproverStamp>,
    pub payload_hash: String,
}

impl AccessRequestRecord {
    pub fn created_v1(
        id: AccessRequestId,
        input: AccessRequestCreateInput,
        created_at: MonotonicTimeNs,
        payload_hash: String,
    ) -> Result<Self, ContractViolation> {
        input.validate()?;
        let expires_at = created_at.checked_add_hours(input.duration_hours).ok_or(
            ContractViolation::InvalidValue {
                field: "access_request_record.expires_at",
                reason: "created_at + duration_hours overflows",
            },
        )?;
        let row = Self {
            schema_version: ACCESS_REQUEST_CONTRACT_VERSION,
            id,
            requester: input.requester,
            account: input.account,
            reason: input.reason,
            services: input.services,
            resources: input.resources,
            duration_hours: input.duration_hours,
            status: AccessRequestStatus::Created,
            created_at,
            expires_at,
            manager_decision: None,
            devops_decision: None,
            payload_hash,
        };
        row.validate()?;
        Ok(row)
    }

    /// True once an approved grant has run past its window; other states never expire.
    pub fn is_expired_at(&self, now: MonotonicTimeNs) -> bool {
        self.status == AccessRequestStatus::DevopsApproved && now > self.expires_at
    }

    /// Returns the record moved to `next`, stamping the approver for staged actions.
    pub fn transitioned(
        &self,
        action: AccessRequestAction,
        next: AccessRequestStatus,
        stamp: Option<ApproverStamp>,
    ) -> Result<Self, ContractViolation> {
        let mut row = self.clone();
        row.status = next;
        match (action.stage(), stamp) {
            (Some(ApprovalStage::Manager), Some(stamp)) => row.manager_decision = Some(stamp),
            (Some(ApprovalStage::Devops), Some(stamp)) => row.devops_decision = Some(stamp),
            (None, Some(_)) => {
                return Err(ContractViolation::InvalidValue {
                    field: "access_request_record.transition",
                    reason: "approver stamp only applies to staged actions",
                })
            }
            (_, None) => {}
        }
        row.validate()?;
        Ok(row)
    }
}

impl Validate for AccessRequestRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != ACCESS_REQUEST_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "access_request_record.schema_version",
                reason: "must match ACCESS_REQUEST_CONTRACT_VERSION",
            });
        }
        self.id.validate()?;
        validate_text(
            "access_request_record.requester",
            &self.requester,
            MAX_REQUESTER_LEN,
        )?;
        validate_text(
            "access_request_record.account",
            &self.account,
            MAX_ACCOUNT_LEN,
        )?;
        validate_text(
            "access_request_record.reason",
            &self.reason,
            MAX_REASON_LEN,
        )?;
        validate_tag_list(
            "access_request_record.services",
            &self.services,
            MAX_SERVICE_TAG_LEN,
        )?;
        validate_tag_list(
            "access_request_record.resources",
            &self.resources,
            MAX_RESOURCE_LEN,
        )?;
        validate_duration_hours("access_request_record.duration_hours", self.duration_hours)?;
        if self.created_at.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "access_request_record.created_at",
                reason: "must be > 0",
            });
        }
        if self.created_at.checked_add_hours(self.duration_hours) != Some(self.expires_at) {
            return Err(ContractViolation::InvalidValue {
                field: "access_request_record.expires_at",
                reason: "must equal created_at + duration_hours",
            });
        }
        if let Some(stamp) = &self.manager_decision {
            stamp.validate()?;
        }
        if let Some(stamp) = &self.devops_decision {
            stamp.validate()?;
        }
        validate_text(
            "access_request_record.payload_hash",
            &self.payload_hash,
            128,
        )?;
        Ok(())
    }
}
