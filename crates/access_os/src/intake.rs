#![forbid(unsafe_code)]

use std::sync::Arc;

use access_engines::interpret::{fresh_correlation_id, InterpretationClient};
use access_kernel_contracts::access_request::AccessRequestCreateInput;
use access_kernel_contracts::intake::{
    FollowupPayload, IntakeOutcome, IntakeRequest, InterpretRequest, InterpretResponse,
};
use access_kernel_contracts::Validate;
use tracing::{info, warn};

use crate::error::AccessError;
use crate::lifecycle::AccessLifecycleRuntime;

/// Free-form intake: interpret, ask back if needed, and create only from complete data.
pub struct IntakeOrchestrator {
    client: Arc<dyn InterpretationClient>,
    lifecycle: Arc<AccessLifecycleRuntime>,
}

impl IntakeOrchestrator {
    pub fn new(
        client: Arc<dyn InterpretationClient>,
        lifecycle: Arc<AccessLifecycleRuntime>,
    ) -> Self {
        Self { client, lifecycle }
    }

    /// Blocks on the interpretation call.
    pub fn handle(&self, intake: IntakeRequest) -> Result<IntakeOutcome, AccessError> {
        intake.validate()?;
        let correlation_id = fresh_correlation_id()?;
        let req = InterpretRequest::from_intake_v1(correlation_id.clone(), &intake)?;

        let resp = self.client.interpret(&req).map_err(|err| {
            warn!(
                correlation_id = correlation_id.as_str(),
                kind = err.kind.as_str(),
                detail = %err.detail,
                "interpretation call failed"
            );
            AccessError::from(err)
        })?;

        if resp.need_followup {
            info!(
                correlation_id = correlation_id.as_str(),
                questions = resp.followup_questions.len(),
                "interpretation needs followup"
            );
            return Ok(IntakeOutcome::Followup(FollowupPayload {
                correlation_id,
                questions: resp.followup_questions,
                partial: resp.partial_data,
            }));
        }

        let input = create_input_from_interpretation(resp)?;
        let row = self.lifecycle.create(input)?;
        info!(
            correlation_id = correlation_id.as_str(),
            request_id = %row.id,
            "intake created access request"
        );
        Ok(IntakeOutcome::Created(row))
    }
}

/// Every field must be present; nothing is defaulted or taken from partial data.
fn create_input_from_interpretation(
    resp: InterpretResponse,
) -> Result<AccessRequestCreateInput, AccessError> {
    let requester = non_blank(resp.requester);
    let account = non_blank(resp.account);
    let reason = non_blank(resp.reason);

    let mut missing: Vec<&'static str> = Vec::new();
    if requester.is_none() {
        missing.push("requester");
    }
    if account.is_none() {
        missing.push("account");
    }
    if reason.is_none() {
        missing.push("reason");
    }
    if resp.services.is_none() {
        missing.push("services");
    }
    if resp.resources.is_none() {
        missing.push("resources");
    }
    if resp.duration_hours.is_none() {
        missing.push("durationHours");
    }

    match (
        requester,
        account,
        reason,
        resp.services,
        resp.resources,
        resp.duration_hours,
    ) {
        (
            Some(requester),
            Some(account),
            Some(reason),
            Some(services),
            Some(resources),
            Some(duration_hours),
        ) => AccessRequestCreateInput::v1(
            requester,
            account,
            reason,
            services,
            resources,
            duration_hours,
        )
        .map_err(|violation| AccessError::InvalidInterpretation { violation }),
        _ => Err(AccessError::IncompleteInterpretation { missing }),
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}
