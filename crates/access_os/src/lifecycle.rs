#![forbid(unsafe_code)]

use std::sync::Arc;

use access_engines::lifecycle::{creation_payload_hash, next_status, reason_code_for};
use access_kernel_contracts::access_request::{
    AccessRequestAction, AccessRequestCreateInput, AccessRequestId, AccessRequestRecord,
    AccessRequestStatus, ApproverStamp,
};
use access_kernel_contracts::MonotonicTimeNs;
use access_storage::{AccessRequestStore, CasOutcome, StatusTransition};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::ApproverConfig;
use crate::error::AccessError;

/// Owns every status change of an access request except background sweeping.
pub struct AccessLifecycleRuntime {
    store: Arc<dyn AccessRequestStore>,
    clock: Arc<dyn Clock>,
    approvers: ApproverConfig,
}

impl AccessLifecycleRuntime {
    pub fn new(
        store: Arc<dyn AccessRequestStore>,
        clock: Arc<dyn Clock>,
        approvers: ApproverConfig,
    ) -> Self {
        Self {
            store,
            clock,
            approvers,
        }
    }

    pub fn now(&self) -> MonotonicTimeNs {
        self.clock.now()
    }

    pub fn store(&self) -> &Arc<dyn AccessRequestStore> {
        &self.store
    }

    pub fn create(&self, input: AccessRequestCreateInput) -> Result<AccessRequestRecord, AccessError> {
        let payload_hash = creation_payload_hash(&input);
        let row = self
            .store
            .insert_created(input, self.clock.now(), payload_hash)?;
        info!(
            request_id = %row.id,
            requester = %row.requester,
            duration_hours = row.duration_hours,
            reason_code = reason_code_for(AccessRequestAction::Create).0,
            "access request created"
        );
        Ok(row)
    }

    /// Reads a request, persisting expiry first when its approved window has elapsed.
    pub fn get(&self, id: AccessRequestId) -> Result<AccessRequestRecord, AccessError> {
        let row = self.store.get(id)?.ok_or(AccessError::NotFound { id })?;
        self.settle_expiry(row)
    }

    pub fn status(&self, id: AccessRequestId) -> Result<AccessRequestStatus, AccessError> {
        Ok(self.get(id)?.status)
    }

    pub fn list(&self) -> Result<Vec<AccessRequestRecord>, AccessError> {
        self.store
            .list()?
            .into_iter()
            .map(|row| self.settle_expiry(row))
            .collect()
    }

    pub fn approve_by_manager(&self, id: AccessRequestId) -> Result<AccessRequestRecord, AccessError> {
        self.apply_stage_action(id, AccessRequestAction::ManagerApprove)
    }

    pub fn reject_by_manager(&self, id: AccessRequestId) -> Result<AccessRequestRecord, AccessError> {
        self.apply_stage_action(id, AccessRequestAction::ManagerReject)
    }

    pub fn approve_by_devops(&self, id: AccessRequestId) -> Result<AccessRequestRecord, AccessError> {
        self.apply_stage_action(id, AccessRequestAction::DevopsApprove)
    }

    pub fn reject_by_devops(&self, id: AccessRequestId) -> Result<AccessRequestRecord, AccessError> {
        self.apply_stage_action(id, AccessRequestAction::DevopsReject)
    }

    fn apply_stage_action(
        &self,
        id: AccessRequestId,
        action: AccessRequestAction,
    ) -> Result<AccessRequestRecord, AccessError> {
        let row = self.get(id)?;
        let next = next_status(row.status, action).ok_or(AccessError::InvalidTransition {
            id,
            action,
            current: row.status,
        })?;
        let stage = action.stage().ok_or(AccessError::Internal {
            detail: format!("{action} is not a staged decision"),
        })?;
        let now = self.clock.now();
        let stamp = ApproverStamp::v1(self.approvers.for_stage(stage).to_string(), now)?;
        let next_row = row.transitioned(action, next, Some(stamp))?;

        match self.store.compare_and_set_status(StatusTransition {
            expected: row.status,
            action,
            at: now,
            next: next_row,
        })? {
            CasOutcome::Applied(stored) => {
                info!(
                    request_id = %id,
                    action = action.as_str(),
                    from = %row.status,
                    to = %stored.status,
                    reason_code = reason_code_for(action).0,
                    "access request transitioned"
                );
                Ok(stored)
            }
            CasOutcome::Conflict(current) => Err(AccessError::InvalidTransition {
                id,
                action,
                current: current.status,
            }),
        }
    }

    fn settle_expiry(&self, row: AccessRequestRecord) -> Result<AccessRequestRecord, AccessError> {
        let now = self.clock.now();
        if !row.is_expired_at(now) {
            return Ok(row);
        }
        match expire_record(self.store.as_ref(), &row, now)? {
            CasOutcome::Applied(stored) => {
                info!(request_id = %stored.id, "access request expired on read");
                Ok(stored)
            }
            CasOutcome::Conflict(current) => {
                debug!(request_id = %current.id, status = %current.status, "expiry already settled");
                Ok(current)
            }
        }
    }
}

/// Compare-and-set `DEVOPS_APPROVED -> EXPIRED`; shared by lazy reads and the sweeper.
pub(crate) fn expire_record(
    store: &dyn AccessRequestStore,
    row: &AccessRequestRecord,
    now: MonotonicTimeNs,
) -> Result<CasOutcome, AccessError> {
    let action = AccessRequestAction::Expire;
    let next = next_status(row.status, action).ok_or(AccessError::InvalidTransition {
        id: row.id,
        action,
        current: row.status,
    })?;
    let next_row = row.transitioned(action, next, None)?;
    Ok(store.compare_and_set_status(StatusTransition {
        expected: row.status,
        action,
        at: now,
        next: next_row,
    })?)
}
