#![forbid(unsafe_code)]

use std::sync::Arc;
use std::thread;

use access_kernel_contracts::access_request::{
    AccessRequestAction, AccessRequestCreateInput, AccessRequestId, AccessRequestRecord,
    AccessRequestStatus, ApproverStamp,
};
use access_kernel_contracts::MonotonicTimeNs;
use access_storage::{
    AccessRequestStore, CasOutcome, InMemoryAccessRequestStore, StatusTransition, StorageError,
};

fn input(reason: &str) -> AccessRequestCreateInput {
    AccessRequestCreateInput::v1(
        "alice@corp.example",
        "123456789012",
        reason,
        vec!["S3".to_string()],
        vec!["arn:aws:s3:::bucket/*".to_string()],
        4,
    )
    .unwrap()
}

fn manager_approve(row: &AccessRequestRecord, t: u64) -> StatusTransition {
    let stamp = ApproverStamp::v1("manager@corp".to_string(), MonotonicTimeNs(t)).unwrap();
    StatusTransition {
        expected: AccessRequestStatus::Created,
        action: AccessRequestAction::ManagerApprove,
        at: MonotonicTimeNs(t),
        next: row
            .transitioned(
                AccessRequestAction::ManagerApprove,
                AccessRequestStatus::ManagerApproved,
                Some(stamp),
            )
            .unwrap(),
    }
}

#[test]
fn at_access_request_db_01_insert_assigns_sequential_ids_in_created() {
    let s = InMemoryAccessRequestStore::new_in_memory();
    let a = s
        .insert_created(input("first"), MonotonicTimeNs(10), "hash_a".to_string())
        .unwrap();
    let b = s
        .insert_created(input("second"), MonotonicTimeNs(11), "hash_b".to_string())
        .unwrap();

    assert_eq!(a.id.get(), 1);
    assert_eq!(b.id.get(), 2);
    assert_eq!(a.status, AccessRequestStatus::Created);
    assert_eq!(s.get(a.id).unwrap(), Some(a.clone()));

    let all = s.list().unwrap();
    assert_eq!(all.iter().map(|r| r.id).collect::<Vec<_>>(), vec![a.id, b.id]);

    let events = s.ledger_events().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, AccessRequestAction::Create);
    assert_eq!(events[0].from_status, None);
    assert_eq!(events[0].to_status, AccessRequestStatus::Created);
}

#[test]
fn at_access_request_db_02_cas_applies_only_on_expected_status() {
    let s = InMemoryAccessRequestStore::new_in_memory();
    let row = s
        .insert_created(input("cas"), MonotonicTimeNs(10), "hash".to_string())
        .unwrap();

    let applied = s.compare_and_set_status(manager_approve(&row, 20)).unwrap();
    let CasOutcome::Applied(stored) = applied else {
        panic!("expected applied outcome");
    };
    assert_eq!(stored.status, AccessRequestStatus::ManagerApproved);

    let replay = s.compare_and_set_status(manager_approve(&row, 21)).unwrap();
    match replay {
        CasOutcome::Conflict(current) => {
            assert_eq!(current.status, AccessRequestStatus::ManagerApproved)
        }
        CasOutcome::Applied(_) => panic!("stale transition must not apply"),
    }

    let events = s.ledger_events().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].from_status, Some(AccessRequestStatus::Created));
    assert_eq!(events[1].to_status, AccessRequestStatus::ManagerApproved);
    assert_eq!(events[1].at, MonotonicTimeNs(20));
}

#[test]
fn at_access_request_db_03_immutable_fields_cannot_change() {
    let s = InMemoryAccessRequestStore::new_in_memory();
    let row = s
        .insert_created(input("immutable"), MonotonicTimeNs(10), "hash".to_string())
        .unwrap();
    let mut t = manager_approve(&row, 20);
    t.next.reason = "rewritten".to_string();

    let out = s.compare_and_set_status(t);
    assert!(matches!(
        out,
        Err(StorageError::ImmutableFieldChanged {
            field: "reason",
            ..
        })
    ));
    assert_eq!(s.get(row.id).unwrap().unwrap().status, AccessRequestStatus::Created);
}

#[test]
fn at_access_request_db_04_unknown_id_is_not_found() {
    let s = InMemoryAccessRequestStore::new_in_memory();
    let row = s
        .insert_created(input("one"), MonotonicTimeNs(10), "hash".to_string())
        .unwrap();
    let mut t = manager_approve(&row, 20);
    t.next.id = AccessRequestId::new(99).unwrap();

    assert!(matches!(
        s.compare_and_set_status(t),
        Err(StorageError::NotFound { .. })
    ));
    assert_eq!(
        s.get(AccessRequestId::new(99).unwrap())
            .unwrap(),
        None
    );
}

#[test]
fn at_access_request_db_05_list_by_status_filters_current_projection() {
    let s = InMemoryAccessRequestStore::new_in_memory();
    let a = s
        .insert_created(input("a"), MonotonicTimeNs(10), "hash".to_string())
        .unwrap();
    let _b = s
        .insert_created(input("b"), MonotonicTimeNs(11), "hash".to_string())
        .unwrap();
    s.compare_and_set_status(manager_approve(&a, 20)).unwrap();

    let approved = s
        .list_by_status(AccessRequestStatus::ManagerApproved)
        .unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, a.id);
    assert_eq!(
        s.list_by_status(AccessRequestStatus::Created).unwrap().len(),
        1
    );
    assert!(s
        .list_by_status(AccessRequestStatus::Expired)
        .unwrap()
        .is_empty());
}

#[test]
fn at_access_request_db_06_concurrent_cas_applies_exactly_once() {
    let s = Arc::new(InMemoryAccessRequestStore::new_in_memory());
    let row = s
        .insert_created(input("race"), MonotonicTimeNs(10), "hash".to_string())
        .unwrap();

    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let s = Arc::clone(&s);
            let t = manager_approve(&row, 20 + i);
            thread::spawn(move || s.compare_and_set_status(t).unwrap())
        })
        .collect();
    let applied = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|o| matches!(o, CasOutcome::Applied(_)))
        .count();

    assert_eq!(applied, 1);
    assert_eq!(s.ledger_events().unwrap().len(), 2);
}
