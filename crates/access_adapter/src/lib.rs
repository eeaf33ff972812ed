#![forbid(unsafe_code)]

use std::sync::Arc;

use access_engines::command::CommandFormatter;
use access_engines::interpret::{HttpInterpretationClient, InterpretationClient};
use access_kernel_contracts::access_request::{
    AccessRequestCreateInput, AccessRequestId, AccessRequestRecord, AccessRequestStatus,
};
use access_kernel_contracts::intake::{IntakeOutcome, IntakeRequest};
use access_kernel_contracts::policy::{PermissionDocument, PolicyExport};
use access_kernel_contracts::ContractViolation;
use access_os::{
    AccessArtifactRuntime, AccessError, AccessLifecycleRuntime, AccessWorkflowConfig, Clock,
    ExpirySweeper, IntakeOrchestrator, SystemClock,
};
use access_storage::{AccessRequestStore, InMemoryAccessRequestStore};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Direct-submission body. Omitted `durationHours` takes the configured default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateAccessRequestBody {
    #[serde(alias = "requesterEmail")]
    pub requester: String,
    #[serde(alias = "awsAccount")]
    pub account: String,
    pub reason: String,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default, alias = "resourceArns")]
    pub resources: Vec<String>,
    #[serde(default)]
    pub duration_hours: Option<u32>,
}

impl CreateAccessRequestBody {
    pub fn into_create_input(
        self,
        default_duration_hours: u32,
    ) -> Result<AccessRequestCreateInput, ContractViolation> {
        AccessRequestCreateInput::v1(
            self.requester,
            self.account,
            self.reason,
            self.services,
            self.resources,
            self.duration_hours.unwrap_or(default_duration_hours),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequestStatusResponse {
    pub id: AccessRequestId,
    pub status: AccessRequestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliCommandResponse {
    pub id: AccessRequestId,
    pub command: String,
}

/// Uniform envelope: `status` is `success` or `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: Some(data),
            code: None,
            error: None,
        }
    }

    pub fn error(code: &str, error: String) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            code: Some(code.to_string()),
            error: Some(error),
        }
    }
}

pub fn status_for_error(err: &AccessError) -> StatusCode {
    match err {
        AccessError::NotFound { .. } => StatusCode::NOT_FOUND,
        AccessError::InvalidTransition { .. } | AccessError::PreconditionFailed { .. } => {
            StatusCode::CONFLICT
        }
        AccessError::IncompleteInterpretation { .. }
        | AccessError::InvalidInterpretation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AccessError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AccessError::TransportFailure(_) => StatusCode::BAD_GATEWAY,
        AccessError::Storage(_) | AccessError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: AccessError) -> Response {
    let status = status_for_error(&err);
    if status.is_server_error() {
        warn!(code = err.code(), error = %err, "request failed");
    }
    (
        status,
        Json(ApiResponse::<()>::error(err.code(), err.to_string())),
    )
        .into_response()
}

fn respond<T: Serialize>(status: StatusCode, out: Result<T, AccessError>) -> Response {
    match out {
        Ok(data) => (status, Json(ApiResponse::success(data))).into_response(),
        Err(err) => error_response(err),
    }
}

fn body_rejection_response(rejection: JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            "ACCESS_INVALID_INPUT",
            rejection.body_text(),
        )),
    )
        .into_response()
}

fn parse_id(raw: &str) -> Result<AccessRequestId, AccessError> {
    let v = raw.parse::<u64>().map_err(|_| {
        AccessError::InvalidInput(ContractViolation::InvalidValue {
            field: "access_request_id",
            reason: "must be a positive integer",
        })
    })?;
    Ok(AccessRequestId::new(v)?)
}

/// Everything the HTTP boundary needs, wired over one shared store and clock.
pub struct AdapterRuntime {
    lifecycle: Arc<AccessLifecycleRuntime>,
    artifacts: AccessArtifactRuntime,
    intake: IntakeOrchestrator,
    sweeper: Arc<ExpirySweeper>,
    default_duration_hours: u32,
}

impl AdapterRuntime {
    pub fn new(
        config: &AccessWorkflowConfig,
        store: Arc<dyn AccessRequestStore>,
        clock: Arc<dyn Clock>,
        interpreter: Arc<dyn InterpretationClient>,
    ) -> Self {
        let lifecycle = Arc::new(AccessLifecycleRuntime::new(
            store.clone(),
            clock.clone(),
            config.approvers.clone(),
        ));
        Self {
            artifacts: AccessArtifactRuntime::new(
                lifecycle.clone(),
                CommandFormatter::new(config.cli_policy_document_mode),
            ),
            intake: IntakeOrchestrator::new(interpreter, lifecycle.clone()),
            sweeper: Arc::new(ExpirySweeper::new(store, clock)),
            lifecycle,
            default_duration_hours: config.default_duration_hours,
        }
    }

    /// In-memory store, wall clock and the HTTP interpretation client.
    pub fn from_config(config: &AccessWorkflowConfig) -> Result<Self, AccessError> {
        let interpreter = HttpInterpretationClient::new(&config.interpret)?;
        Ok(Self::new(
            config,
            Arc::new(InMemoryAccessRequestStore::new_in_memory()),
            Arc::new(SystemClock),
            Arc::new(interpreter),
        ))
    }

    pub fn sweeper(&self) -> Arc<ExpirySweeper> {
        self.sweeper.clone()
    }

    pub fn create_access_request(
        &self,
        body: CreateAccessRequestBody,
    ) -> Result<AccessRequestRecord, AccessError> {
        let input = body.into_create_input(self.default_duration_hours)?;
        self.lifecycle.create(input)
    }

    pub fn list_access_requests(&self) -> Result<Vec<AccessRequestRecord>, AccessError> {
        self.lifecycle.list()
    }

    pub fn get_access_request(&self, id: AccessRequestId) -> Result<AccessRequestRecord, AccessError> {
        self.lifecycle.get(id)
    }

    pub fn access_request_status(
        &self,
        id: AccessRequestId,
    ) -> Result<AccessRequestStatusResponse, AccessError> {
        Ok(AccessRequestStatusResponse {
            id,
            status: self.lifecycle.status(id)?,
        })
    }

    pub fn permission_document(&self, id: AccessRequestId) -> Result<PermissionDocument, AccessError> {
        self.artifacts.permission_document(id)
    }

    pub fn policy_export(&self, id: AccessRequestId) -> Result<PolicyExport, AccessError> {
        self.artifacts.policy_export(id)
    }

    pub fn cli_command(&self, id: AccessRequestId) -> Result<CliCommandResponse, AccessError> {
        Ok(CliCommandResponse {
            id,
            command: self.artifacts.cli_command(id)?,
        })
    }

    /// Blocking; call from `spawn_blocking`.
    pub fn interpret_intake(&self, intake: IntakeRequest) -> Result<IntakeOutcome, AccessError> {
        self.intake.handle(intake)
    }
}

pub fn build_router(runtime: Arc<AdapterRuntime>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/v1/access-requests",
            post(create_access_request).get(list_access_requests),
        )
        .route("/api/v1/access-requests/:id", get(get_access_request))
        .route("/api/v1/access-requests/:id/status", get(access_request_status))
        .route("/api/v1/access-requests/:id/manager/approve", post(manager_approve))
        .route("/api/v1/access-requests/:id/manager/reject", post(manager_reject))
        .route("/api/v1/access-requests/:id/devops/approve", post(devops_approve))
        .route("/api/v1/access-requests/:id/devops/reject", post(devops_reject))
        .route("/api/v1/access-requests/:id/iam-policy", get(iam_policy))
        .route(
            "/api/v1/access-requests/:id/iam-policy/download",
            get(iam_policy_download),
        )
        .route("/api/v1/access-requests/:id/aws-cli-command", get(aws_cli_command))
        .route("/api/v1/llm-access-requests/interpret", post(interpret_intake))
        .with_state(runtime)
}

type SharedRuntime = State<Arc<AdapterRuntime>>;

async fn healthz() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

async fn create_access_request(
    State(runtime): SharedRuntime,
    body: Result<Json<CreateAccessRequestBody>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(body)) => respond(StatusCode::CREATED, runtime.create_access_request(body)),
        Err(rejection) => body_rejection_response(rejection),
    }
}

async fn list_access_requests(State(runtime): SharedRuntime) -> Response {
    respond(StatusCode::OK, runtime.list_access_requests())
}

async fn get_access_request(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    respond(
        StatusCode::OK,
        parse_id(&id).and_then(|id| runtime.get_access_request(id)),
    )
}

async fn access_request_status(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    respond(
        StatusCode::OK,
        parse_id(&id).and_then(|id| runtime.access_request_status(id)),
    )
}

async fn manager_approve(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    respond(
        StatusCode::OK,
        parse_id(&id).and_then(|id| runtime.lifecycle.approve_by_manager(id)),
    )
}

async fn manager_reject(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    respond(
        StatusCode::OK,
        parse_id(&id).and_then(|id| runtime.lifecycle.reject_by_manager(id)),
    )
}

async fn devops_approve(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    respond(
        StatusCode::OK,
        parse_id(&id).and_then(|id| runtime.lifecycle.approve_by_devops(id)),
    )
}

async fn devops_reject(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    respond(
        StatusCode::OK,
        parse_id(&id).and_then(|id| runtime.lifecycle.reject_by_devops(id)),
    )
}

async fn iam_policy(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    respond(
        StatusCode::OK,
        parse_id(&id).and_then(|id| runtime.permission_document(id)),
    )
}

async fn iam_policy_download(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    match parse_id(&id).and_then(|id| runtime.policy_export(id)) {
        Ok(export) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/json".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.filename),
                ),
            ],
            export.document_json,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn aws_cli_command(State(runtime): SharedRuntime, Path(id): Path<String>) -> Response {
    respond(
        StatusCode::OK,
        parse_id(&id).and_then(|id| runtime.cli_command(id)),
    )
}

async fn interpret_intake(
    State(runtime): SharedRuntime,
    body: Result<Json<IntakeRequest>, JsonRejection>,
) -> Response {
    let intake = match body {
        Ok(Json(intake)) => intake,
        Err(rejection) => return body_rejection_response(rejection),
    };
    match tokio::task::spawn_blocking(move || runtime.interpret_intake(intake)).await {
        Ok(out) => respond(StatusCode::OK, out),
        Err(join_err) => {
            error!(error = %join_err, "intake task failed");
            error_response(AccessError::Internal {
                detail: "intake task failed".to_string(),
            })
        }
    }
}
