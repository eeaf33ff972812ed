#![forbid(unsafe_code)]

use access_kernel_contracts::access_request::{
    AccessRequestId, AccessRequestRecord, AccessRequestStatus,
};
use access_kernel_contracts::policy::{policy_filename, PermissionDocument, PolicyExport};
use access_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use thiserror::Error;
use tracing::debug;

/// Service tag to provider actions. Synthesized `Action` lists follow this order.
pub const SERVICE_ACTION_TABLE: &[(&str, &[&str])] = &[
    ("S3", &["s3:PutObject", "s3:GetObject", "s3:ListBucket"]),
    (
        "EC2",
        &[
            "ec2:DescribeInstances",
            "ec2:StartInstances",
            "ec2:StopInstances",
        ],
    ),
];

#[derive(Debug, Error)]
pub enum PolicySynthesisError {
    #[error("permission document is available only after devops approval; current status {current}")]
    NotApproved { current: AccessRequestStatus },
    #[error("access request {id} expired at {expires_at_ns}ns")]
    Expired {
        id: AccessRequestId,
        expires_at_ns: u64,
    },
    #[error("permission document encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

/// A document that passed the approval precondition. Only the synthesizer builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedPolicy {
    request_id: AccessRequestId,
    document: PermissionDocument,
}

impl SynthesizedPolicy {
    pub fn request_id(&self) -> AccessRequestId {
        self.request_id
    }

    pub fn document(&self) -> &PermissionDocument {
        &self.document
    }

    pub fn into_document(self) -> PermissionDocument {
        self.document
    }

    pub fn export(&self) -> Result<PolicyExport, PolicySynthesisError> {
        Ok(PolicyExport {
            filename: policy_filename(self.request_id),
            document_json: serde_json::to_string_pretty(&self.document)?,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct PolicySynthesisRuntime;

impl PolicySynthesisRuntime {
    pub fn synthesize(
        &self,
        record: &AccessRequestRecord,
        now: MonotonicTimeNs,
    ) -> Result<SynthesizedPolicy, PolicySynthesisError> {
        if record.status != AccessRequestStatus::DevopsApproved {
            return Err(PolicySynthesisError::NotApproved {
                current: record.status,
            });
        }
        if record.is_expired_at(now) {
            return Err(PolicySynthesisError::Expired {
                id: record.id,
                expires_at_ns: record.expires_at.0,
            });
        }

        let document = PermissionDocument::allow_v1(
            actions_for_services(&record.services),
            clean_resource_list(&record.resources),
        );
        document.validate()?;
        Ok(SynthesizedPolicy {
            request_id: record.id,
            document,
        })
    }
}

/// Maps tags through the action table. Unknown tags contribute nothing.
pub fn actions_for_services(services: &[String]) -> Vec<String> {
    let tags: Vec<String> = services
        .iter()
        .flat_map(|s| split_legacy_entry(s))
        .map(|s| s.to_ascii_uppercase())
        .collect();
    for tag in &tags {
        if !SERVICE_ACTION_TABLE.iter().any(|(known, _)| known == tag) {
            debug!(service_tag = %tag, "no action mapping for service tag; omitted");
        }
    }
    SERVICE_ACTION_TABLE
        .iter()
        .filter(|(known, _)| tags.iter().any(|t| t == known))
        .flat_map(|(_, actions)| actions.iter().map(|a| (*a).to_string()))
        .collect()
}

/// Flattens entries that still carry a delimited `["a", "b"]` shape into clean identifiers.
/// Any other entry is an identifier already and passes through unchanged.
pub fn clean_resource_list(resources: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for entry in resources.iter().flat_map(|r| split_legacy_entry(r)) {
        if !out.contains(&entry) {
            out.push(entry);
        }
    }
    out
}

fn split_legacy_entry(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return vec![raw.to_string()];
    }
    if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
        return items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    trimmed[1..trimmed.len() - 1]
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
