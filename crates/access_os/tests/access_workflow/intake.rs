#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use access_engines::interpret::{
    InterpretTransportError, InterpretationClient, TransportErrorKind,
};
use access_kernel_contracts::access_request::AccessRequestStatus;
use access_kernel_contracts::intake::{
    FollowupQuestion, IntakeOutcome, IntakeRequest, InterpretPartialData, InterpretRequest,
    InterpretResponse,
};
use access_kernel_contracts::{MonotonicTimeNs, NS_PER_HOUR};
use access_os::{
    AccessError, AccessLifecycleRuntime, ApproverConfig, IntakeOrchestrator, ManualClock,
};
use access_storage::{AccessRequestStore, InMemoryAccessRequestStore};

/// Scripted collaborator that records every request it receives.
struct ScriptedInterpreter {
    reply: Result<InterpretResponse, InterpretTransportError>,
    seen: Mutex<Vec<InterpretRequest>>,
}

impl ScriptedInterpreter {
    fn new(reply: Result<InterpretResponse, InterpretTransportError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<InterpretRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl InterpretationClient for ScriptedInterpreter {
    fn interpret(
        &self,
        req: &InterpretRequest,
    ) -> Result<InterpretResponse, InterpretTransportError> {
        self.seen.lock().unwrap().push(req.clone());
        self.reply.clone()
    }
}

fn orchestrator(
    client: Arc<ScriptedInterpreter>,
) -> (IntakeOrchestrator, Arc<InMemoryAccessRequestStore>) {
    let store = Arc::new(InMemoryAccessRequestStore::new_in_memory());
    let lifecycle = Arc::new(AccessLifecycleRuntime::new(
        store.clone(),
        Arc::new(ManualClock::starting_at(MonotonicTimeNs(NS_PER_HOUR))),
        ApproverConfig::mvp_v1(),
    ));
    (IntakeOrchestrator::new(client, lifecycle), store)
}

fn intake() -> IntakeRequest {
    IntakeRequest {
        requester: Some("alice@corp.example".to_string()),
        account: None,
        reason: "I need to read the logs bucket for a few hours".to_string(),
        duration_hours: None,
        prior_context: None,
    }
}

fn complete_reply() -> InterpretResponse {
    InterpretResponse {
        need_followup: false,
        followup_questions: Vec::new(),
        partial_data: None,
        requester: Some("alice@corp.example".to_string()),
        account: Some("123456789012".to_string()),
        reason: Some("read logs".to_string()),
        services: Some(vec!["S3".to_string()]),
        resources: Some(vec!["arn:aws:s3:::logs/*".to_string()]),
        duration_hours: Some(4),
    }
}

#[test]
fn at_access_intake_01_followup_is_returned_verbatim_without_creating() {
    let questions = vec![FollowupQuestion {
        field: Some("account".to_string()),
        question: "Which AWS account?".to_string(),
    }];
    let mut reply = InterpretResponse::followup_v1(questions.clone());
    reply.partial_data = Some(InterpretPartialData {
        requester: Some("alice@corp.example".to_string()),
        ..InterpretPartialData::default()
    });
    let client = ScriptedInterpreter::new(Ok(reply.clone()));
    let (orch, store) = orchestrator(client.clone());

    let out = orch.handle(intake()).unwrap();
    let IntakeOutcome::Followup(payload) = out else {
        panic!("expected followup outcome");
    };
    assert_eq!(payload.questions, questions);
    assert_eq!(payload.partial, reply.partial_data);
    assert_eq!(payload.correlation_id, client.seen()[0].correlation_id);
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn at_access_intake_02_missing_duration_is_incomplete() {
    let mut reply = complete_reply();
    reply.duration_hours = None;
    let (orch, store) = orchestrator(ScriptedInterpreter::new(Ok(reply)));

    assert_eq!(
        orch.handle(intake()),
        Err(AccessError::IncompleteInterpretation {
            missing: vec!["durationHours"],
        })
    );
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn at_access_intake_03_complete_reply_creates_request() {
    let client = ScriptedInterpreter::new(Ok(complete_reply()));
    let (orch, store) = orchestrator(client.clone());

    let IntakeOutcome::Created(row) = orch.handle(intake()).unwrap() else {
        panic!("expected created outcome");
    };
    assert_eq!(row.status, AccessRequestStatus::Created);
    assert_eq!(row.account, "123456789012");
    assert_eq!(row.duration_hours, 4);
    assert_eq!(store.list().unwrap(), vec![row]);

    let sent = client.seen();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].correlation_id.as_str().starts_with("corr_"));
    assert_eq!(sent[0].requester.as_deref(), Some("alice@corp.example"));
    assert_eq!(sent[0].reason, intake().reason);
}

#[test]
fn at_access_intake_04_transport_failure_creates_nothing() {
    let err = InterpretTransportError::new(TransportErrorKind::Timeout, "read timed out");
    let (orch, store) = orchestrator(ScriptedInterpreter::new(Err(err.clone())));

    let out = orch.handle(intake());
    assert_eq!(out, Err(AccessError::TransportFailure(err)));
    assert_eq!(out.unwrap_err().code(), "ACCESS_TRANSPORT_FAILURE");
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn at_access_intake_05_each_request_gets_a_fresh_correlation_id() {
    let client = ScriptedInterpreter::new(Ok(InterpretResponse::followup_v1(Vec::new())));
    let (orch, _) = orchestrator(client.clone());
    orch.handle(intake()).unwrap();
    orch.handle(intake()).unwrap();

    let sent = client.seen();
    assert_ne!(sent[0].correlation_id, sent[1].correlation_id);
}

#[test]
fn at_access_intake_06_blank_description_is_rejected_before_calling_out() {
    let client = ScriptedInterpreter::new(Ok(complete_reply()));
    let (orch, _) = orchestrator(client.clone());
    let mut req = intake();
    req.reason = "   ".to_string();

    assert!(matches!(orch.handle(req), Err(AccessError::InvalidInput(_))));
    assert!(client.seen().is_empty());
}
