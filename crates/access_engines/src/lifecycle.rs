#![forbid(unsafe_code)]

use access_kernel_contracts::access_request::{
    AccessRequestAction, AccessRequestCreateInput, AccessRequestStatus,
};
use access_kernel_contracts::ReasonCodeId;
use sha2::{Digest, Sha256};

pub mod reason_codes {
    use access_kernel_contracts::ReasonCodeId;

    pub const ACCESS_REQUEST_CREATED: ReasonCodeId = ReasonCodeId(0xAC00_0001);
    pub const ACCESS_REQUEST_MANAGER_APPROVED: ReasonCodeId = ReasonCodeId(0xAC00_0002);
    pub const ACCESS_REQUEST_MANAGER_REJECTED: ReasonCodeId = ReasonCodeId(0xAC00_0003);
    pub const ACCESS_REQUEST_DEVOPS_APPROVED: ReasonCodeId = ReasonCodeId(0xAC00_0004);
    pub const ACCESS_REQUEST_DEVOPS_REJECTED: ReasonCodeId = ReasonCodeId(0xAC00_0005);
    pub const ACCESS_REQUEST_EXPIRED: ReasonCodeId = ReasonCodeId(0xAC00_0006);
}

/// The only edges of the request state machine. Every other pair is rejected.
pub const TRANSITION_TABLE: &[(AccessRequestStatus, AccessRequestAction, AccessRequestStatus)] = &[
    (
        AccessRequestStatus::Created,
        AccessRequestAction::ManagerApprove,
        AccessRequestStatus::ManagerApproved,
    ),
    (
        AccessRequestStatus::Created,
        AccessRequestAction::ManagerReject,
        AccessRequestStatus::ManagerRejected,
    ),
    (
        AccessRequestStatus::ManagerApproved,
        AccessRequestAction::DevopsApprove,
        AccessRequestStatus::DevopsApproved,
    ),
    (
        AccessRequestStatus::ManagerApproved,
        AccessRequestAction::DevopsReject,
        AccessRequestStatus::DevopsRejected,
    ),
    (
        AccessRequestStatus::DevopsApproved,
        AccessRequestAction::Expire,
        AccessRequestStatus::Expired,
    ),
];

pub fn next_status(
    current: AccessRequestStatus,
    action: AccessRequestAction,
) -> Option<AccessRequestStatus> {
    TRANSITION_TABLE
        .iter()
        .find(|(from, a, _)| *from == current && *a == action)
        .map(|(_, _, to)| *to)
}

pub fn reason_code_for(action: AccessRequestAction) -> ReasonCodeId {
    match action {
        AccessRequestAction::Create => reason_codes::ACCESS_REQUEST_CREATED,
        AccessRequestAction::ManagerApprove => reason_codes::ACCESS_REQUEST_MANAGER_APPROVED,
        AccessRequestAction::ManagerReject => reason_codes::ACCESS_REQUEST_MANAGER_REJECTED,
        AccessRequestAction::DevopsApprove => reason_codes::ACCESS_REQUEST_DEVOPS_APPROVED,
        AccessRequestAction::DevopsReject => reason_codes::ACCESS_REQUEST_DEVOPS_REJECTED,
        AccessRequestAction::Expire => reason_codes::ACCESS_REQUEST_EXPIRED,
    }
}

/// SHA-256 over the normalized creation fields, `|`-separated, lists `,`-joined.
pub fn creation_payload_hash(input: &AccessRequestCreateInput) -> String {
    let duration = input.duration_hours.to_string();
    let services = input.services.join(",");
    let resources = input.resources.join(",");
    let parts: [&str; 6] = [
        input.requester.as_str(),
        input.account.as_str(),
        input.reason.as_str(),
        services.as_str(),
        resources.as_str(),
        duration.as_str(),
    ];
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(7 + digest.len() * 2);
    out.push_str("sha256_");
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
