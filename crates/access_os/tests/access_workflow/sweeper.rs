#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use access_kernel_contracts::access_request::{
    AccessRequestAction, AccessRequestCreateInput, AccessRequestId, AccessRequestRecord,
    AccessRequestStatus,
};
use access_kernel_contracts::{MonotonicTimeNs, NS_PER_HOUR};
use access_os::{
    AccessLifecycleRuntime, ApproverConfig, Clock, ExpirySweeper, ManualClock, SweepPassReport,
};
use access_storage::{
    AccessRequestLedgerEvent, AccessRequestStore, CasOutcome, InMemoryAccessRequestStore,
    StatusTransition, StorageError,
};

const T0: MonotonicTimeNs = MonotonicTimeNs(500 * NS_PER_HOUR);

fn input(duration_hours: u32) -> AccessRequestCreateInput {
    AccessRequestCreateInput::v1(
        "bob@corp.example",
        "210987654321",
        "rotate instance fleet",
        vec!["EC2".to_string()],
        vec!["arn:aws:ec2:::instance/*".to_string()],
        duration_hours,
    )
    .unwrap()
}

fn approved(lifecycle: &AccessLifecycleRuntime, duration_hours: u32) -> AccessRequestRecord {
    let row = lifecycle.create(input(duration_hours)).unwrap();
    lifecycle.approve_by_manager(row.id).unwrap();
    lifecycle.approve_by_devops(row.id).unwrap()
}

fn setup<S: AccessRequestStore + 'static>(
    store: Arc<S>,
) -> (Arc<AccessLifecycleRuntime>, Arc<ExpirySweeper>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(T0));
    let lifecycle = Arc::new(AccessLifecycleRuntime::new(
        store.clone(),
        clock.clone(),
        ApproverConfig::mvp_v1(),
    ));
    let sweeper = Arc::new(ExpirySweeper::new(store, clock.clone()));
    (lifecycle, sweeper, clock)
}

fn expire_events(events: &[AccessRequestLedgerEvent], id: AccessRequestId) -> usize {
    events
        .iter()
        .filter(|e| e.request_id == id && e.action == AccessRequestAction::Expire)
        .count()
}

#[test]
fn at_access_sweeper_01_pass_is_idempotent() {
    let store = Arc::new(InMemoryAccessRequestStore::new_in_memory());
    let (lifecycle, sweeper, clock) = setup(store.clone());
    let short = approved(&lifecycle, 1);
    let long = approved(&lifecycle, 48);
    let pending = lifecycle.create(input(1)).unwrap();

    clock.set(MonotonicTimeNs(T0.0 + 2 * NS_PER_HOUR));
    assert_eq!(
        sweeper.run_pass().unwrap(),
        SweepPassReport {
            scanned: 2,
            expired: 1,
            already_settled: 0,
            failed: 0,
        }
    );
    let after_first = store.list().unwrap();

    assert_eq!(
        sweeper.run_pass().unwrap(),
        SweepPassReport {
            scanned: 1,
            expired: 0,
            already_settled: 0,
            failed: 0,
        }
    );
    assert_eq!(store.list().unwrap(), after_first);

    let events = store.ledger_events().unwrap();
    assert_eq!(expire_events(&events, short.id), 1);
    assert_eq!(expire_events(&events, long.id), 0);
    assert_eq!(
        store.get(pending.id).unwrap().unwrap().status,
        AccessRequestStatus::Created
    );
    assert_eq!(
        store.get(short.id).unwrap().unwrap().status,
        AccessRequestStatus::Expired
    );
}

/// Expires every listed row itself, as a concurrent reader would, before the sweeper acts.
struct ReaderWinsStore {
    inner: InMemoryAccessRequestStore,
    clock: Arc<ManualClock>,
}

impl AccessRequestStore for ReaderWinsStore {
    fn insert_created(
        &self,
        input: AccessRequestCreateInput,
        created_at: MonotonicTimeNs,
        payload_hash: String,
    ) -> Result<AccessRequestRecord, StorageError> {
        self.inner.insert_created(input, created_at, payload_hash)
    }

    fn get(&self, id: AccessRequestId) -> Result<Option<AccessRequestRecord>, StorageError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<AccessRequestRecord>, StorageError> {
        self.inner.list()
    }

    fn list_by_status(
        &self,
        status: AccessRequestStatus,
    ) -> Result<Vec<AccessRequestRecord>, StorageError> {
        let rows = self.inner.list_by_status(status)?;
        for row in rows.iter().filter(|r| r.is_expired_at(self.clock.now())) {
            self.inner.compare_and_set_status(StatusTransition {
                expected: row.status,
                action: AccessRequestAction::Expire,
                at: self.clock.now(),
                next: row.transitioned(
                    AccessRequestAction::Expire,
                    AccessRequestStatus::Expired,
                    None,
                )?,
            })?;
        }
        Ok(rows)
    }

    fn compare_and_set_status(
        &self,
        transition: StatusTransition,
    ) -> Result<CasOutcome, StorageError> {
        self.inner.compare_and_set_status(transition)
    }

    fn ledger_events(&self) -> Result<Vec<AccessRequestLedgerEvent>, StorageError> {
        self.inner.ledger_events()
    }
}

#[test]
fn at_access_sweeper_02_lost_race_counts_as_already_settled() {
    let clock = Arc::new(ManualClock::starting_at(T0));
    let store = Arc::new(ReaderWinsStore {
        inner: InMemoryAccessRequestStore::new_in_memory(),
        clock: clock.clone(),
    });
    let lifecycle = AccessLifecycleRuntime::new(store.clone(), clock.clone(), ApproverConfig::mvp_v1());
    let sweeper = ExpirySweeper::new(store.clone(), clock.clone());
    let row = approved(&lifecycle, 1);

    clock.set(MonotonicTimeNs(T0.0 + 2 * NS_PER_HOUR));
    assert_eq!(
        sweeper.run_pass().unwrap(),
        SweepPassReport {
            scanned: 1,
            expired: 0,
            already_settled: 1,
            failed: 0,
        }
    );
    assert_eq!(expire_events(&store.ledger_events().unwrap(), row.id), 1);
}

/// Refuses status writes for one request id.
struct StuckRowStore {
    inner: InMemoryAccessRequestStore,
    stuck: std::sync::Mutex<Option<AccessRequestId>>,
}

impl AccessRequestStore for StuckRowStore {
    fn insert_created(
        &self,
        input: AccessRequestCreateInput,
        created_at: MonotonicTimeNs,
        payload_hash: String,
    ) -> Result<AccessRequestRecord, StorageError> {
        self.inner.insert_created(input, created_at, payload_hash)
    }

    fn get(&self, id: AccessRequestId) -> Result<Option<AccessRequestRecord>, StorageError> {
        self.inner.get(id)
    }

    fn list(&self) -> Result<Vec<AccessRequestRecord>, StorageError> {
        self.inner.list()
    }

    fn list_by_status(
        &self,
        status: AccessRequestStatus,
    ) -> Result<Vec<AccessRequestRecord>, StorageError> {
        self.inner.list_by_status(status)
    }

    fn compare_and_set_status(
        &self,
        transition: StatusTransition,
    ) -> Result<CasOutcome, StorageError> {
        if *self.stuck.lock().unwrap() == Some(transition.next.id) {
            return Err(StorageError::LockPoisoned {
                table: "access_requests",
            });
        }
        self.inner.compare_and_set_status(transition)
    }

    fn ledger_events(&self) -> Result<Vec<AccessRequestLedgerEvent>, StorageError> {
        self.inner.ledger_events()
    }
}

#[test]
fn at_access_sweeper_04_one_failing_row_does_not_stop_the_pass() {
    let store = Arc::new(StuckRowStore {
        inner: InMemoryAccessRequestStore::new_in_memory(),
        stuck: std::sync::Mutex::new(None),
    });
    let (lifecycle, sweeper, clock) = setup(store.clone());
    let stuck = approved(&lifecycle, 1);
    let healthy = approved(&lifecycle, 1);
    *store.stuck.lock().unwrap() = Some(stuck.id);

    clock.set(MonotonicTimeNs(T0.0 + 2 * NS_PER_HOUR));
    assert_eq!(
        sweeper.run_pass().unwrap(),
        SweepPassReport {
            scanned: 2,
            expired: 1,
            already_settled: 0,
            failed: 1,
        }
    );
    assert_eq!(
        store.get(healthy.id).unwrap().unwrap().status,
        AccessRequestStatus::Expired
    );
    assert_eq!(
        store.get(stuck.id).unwrap().unwrap().status,
        AccessRequestStatus::DevopsApproved
    );
}

#[tokio::test(start_paused = true)]
async fn at_access_sweeper_03_periodic_task_expires_without_reads() {
    let store = Arc::new(InMemoryAccessRequestStore::new_in_memory());
    let (lifecycle, sweeper, clock) = setup(store.clone());
    let first = approved(&lifecycle, 1);
    clock.set(MonotonicTimeNs(T0.0 + 2 * NS_PER_HOUR));

    let handle = sweeper.spawn_periodic(Duration::from_secs(600));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        store.get(first.id).unwrap().unwrap().status,
        AccessRequestStatus::Expired
    );

    let second = approved(&lifecycle, 1);
    clock.set(MonotonicTimeNs(T0.0 + 4 * NS_PER_HOUR));
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(
        store.get(second.id).unwrap().unwrap().status,
        AccessRequestStatus::Expired
    );

    handle.abort();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(handle.is_finished());
}
