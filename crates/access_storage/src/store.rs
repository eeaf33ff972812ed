#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use access_kernel_contracts::access_request::{
    AccessRequestAction, AccessRequestCreateInput, AccessRequestId, AccessRequestRecord,
    AccessRequestStatus,
};
use access_kernel_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use thiserror::Error;

use crate::repo::AccessRequestStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("{table} row not found: {key}")]
    NotFound { table: &'static str, key: String },
    #[error("{table} lock poisoned")]
    LockPoisoned { table: &'static str },
    #[error("{table}.{field} is immutable once written")]
    ImmutableFieldChanged {
        table: &'static str,
        field: &'static str,
    },
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

/// One applied status change; the ledger is append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequestLedgerEvent {
    pub event_id: u64,
    pub request_id: AccessRequestId,
    pub action: AccessRequestAction,
    pub from_status: Option<AccessRequestStatus>,
    pub to_status: AccessRequestStatus,
    pub at: MonotonicTimeNs,
}

/// Conditional write: applies `next` only while the stored status still equals `expected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub expected: AccessRequestStatus,
    pub action: AccessRequestAction,
    pub at: MonotonicTimeNs,
    pub next: AccessRequestRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    Applied(AccessRequestRecord),
    /// The stored status no longer matched; carries the record as currently stored.
    Conflict(AccessRequestRecord),
}

#[derive(Debug)]
struct AccessRequestTables {
    current: BTreeMap<AccessRequestId, AccessRequestRecord>,
    ledger: Vec<AccessRequestLedgerEvent>,
    next_request_id: u64,
    next_event_id: u64,
}

impl AccessRequestTables {
    fn append_ledger_event(
        &mut self,
        request_id: AccessRequestId,
        action: AccessRequestAction,
        from_status: Option<AccessRequestStatus>,
        to_status: AccessRequestStatus,
        at: MonotonicTimeNs,
    ) {
        let event_id = self.next_event_id;
        self.next_event_id = self.next_event_id.saturating_add(1);
        self.ledger.push(AccessRequestLedgerEvent {
            event_id,
            request_id,
            action,
            from_status,
            to_status,
            at,
        });
    }
}

#[derive(Debug)]
pub struct InMemoryAccessRequestStore {
    tables: Mutex<AccessRequestTables>,
}

impl Default for InMemoryAccessRequestStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl InMemoryAccessRequestStore {
    pub fn new_in_memory() -> Self {
        Self {
            tables: Mutex::new(AccessRequestTables {
                current: BTreeMap::new(),
                ledger: Vec::new(),
                next_request_id: 1,
                next_event_id: 1,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, AccessRequestTables>, StorageError> {
        self.tables.lock().map_err(|_| StorageError::LockPoisoned {
            table: "access_requests",
        })
    }
}

fn ensure_immutable_fields(
    stored: &AccessRequestRecord,
    next: &AccessRequestRecord,
) -> Result<(), StorageError> {
    let changed = |field: &'static str| StorageError::ImmutableFieldChanged {
        table: "access_requests",
        field,
    };
    if stored.schema_version != next.schema_version {
        return Err(changed("schema_version"));
    }
    if stored.requester != next.requester {
        return Err(changed("requester"));
    }
    if stored.account != next.account {
        return Err(changed("account"));
    }
    if stored.reason != next.reason {
        return Err(changed("reason"));
    }
    if stored.services != next.services {
        return Err(changed("services"));
    }
    if stored.resources != next.resources {
        return Err(changed("resources"));
    }
    if stored.duration_hours != next.duration_hours {
        return Err(changed("duration_hours"));
    }
    if stored.created_at != next.created_at {
        return Err(changed("created_at"));
    }
    if stored.expires_at != next.expires_at {
        return Err(changed("expires_at"));
    }
    if stored.payload_hash != next.payload_hash {
        return Err(changed("payload_hash"));
    }
    Ok(())
}

impl AccessRequestStore for InMemoryAccessRequestStore {
    fn insert_created(
        &self,
        input: AccessRequestCreateInput,
        created_at: MonotonicTimeNs,
        payload_hash: String,
    ) -> Result<AccessRequestRecord, StorageError> {
        let mut tables = self.lock()?;
        let id = AccessRequestId::new(tables.next_request_id)?;
        let row = AccessRequestRecord::created_v1(id, input, created_at, payload_hash)?;
        tables.next_request_id = tables.next_request_id.saturating_add(1);
        tables.append_ledger_event(
            id,
            AccessRequestAction::Create,
            None,
            AccessRequestStatus::Created,
            created_at,
        );
        tables.current.insert(id, row.clone());
        Ok(row)
    }

    fn get(&self, id: AccessRequestId) -> Result<Option<AccessRequestRecord>, StorageError> {
        Ok(self.lock()?.current.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<AccessRequestRecord>, StorageError> {
        Ok(self.lock()?.current.values().cloned().collect())
    }

    fn list_by_status(
        &self,
        status: AccessRequestStatus,
    ) -> Result<Vec<AccessRequestRecord>, StorageError> {
        Ok(self
            .lock()?
            .current
            .values()
            .filter(|row| row.status == status)
            .cloned()
            .collect())
    }

    fn compare_and_set_status(
        &self,
        transition: StatusTransition,
    ) -> Result<CasOutcome, StorageError> {
        transition.next.validate()?;
        if transition.next.status == transition.expected {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "status_transition.next.status",
                    reason: "must differ from expected status",
                },
            ));
        }

        let mut tables = self.lock()?;
        let id = transition.next.id;
        let stored = tables
            .current
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                table: "access_requests",
                key: id.to_string(),
            })?;
        if stored.status != transition.expected {
            return Ok(CasOutcome::Conflict(stored));
        }
        ensure_immutable_fields(&stored, &transition.next)?;

        tables.append_ledger_event(
            id,
            transition.action,
            Some(stored.status),
            transition.next.status,
            transition.at,
        );
        tables.current.insert(id, transition.next.clone());
        Ok(CasOutcome::Applied(transition.next))
    }

    fn ledger_events(&self) -> Result<Vec<AccessRequestLedgerEvent>, StorageError> {
        Ok(self.lock()?.ledger.clone())
    }
}
