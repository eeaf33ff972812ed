#![forbid(unsafe_code)]

use access_kernel_contracts::access_request::{
    AccessRequestCreateInput, AccessRequestId, AccessRequestRecord, AccessRequestStatus,
};
use access_kernel_contracts::MonotonicTimeNs;

use crate::store::{AccessRequestLedgerEvent, CasOutcome, StatusTransition, StorageError};

/// Typed repository interface for access request tables (`access_requests` + `access_request_ledger`).
///
/// Implementations must make `compare_and_set_status` atomic per record: foreground
/// approvals, lazy expiry and the background sweeper all race through it.
pub trait AccessRequestStore: Send + Sync {
    /// Assigns a fresh id and persists the request in `CREATED`.
    fn insert_created(
        &self,
        input: AccessRequestCreateInput,
        created_at: MonotonicTimeNs,
        payload_hash: String,
    ) -> Result<AccessRequestRecord, StorageError>;

    fn get(&self, id: AccessRequestId) -> Result<Option<AccessRequestRecord>, StorageError>;

    fn list(&self) -> Result<Vec<AccessRequestRecord>, StorageError>;

    fn list_by_status(
        &self,
        status: AccessRequestStatus,
    ) -> Result<Vec<AccessRequestRecord>, StorageError>;

    fn compare_and_set_status(
        &self,
        transition: StatusTransition,
    ) -> Result<CasOutcome, StorageError>;

    fn ledger_events(&self) -> Result<Vec<AccessRequestLedgerEvent>, StorageError>;
}
