#![forbid(unsafe_code)]

use serde::{Deserialize, Deserializer, Serialize};

use crate::access_request::AccessRequestRecord;
use crate::common::validate_text;
use crate::{ContractViolation, Validate};

const MAX_DESCRIPTION_LEN: usize = 8_192;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(v: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(v.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for CorrelationId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("correlation_id", &self.0, 128)
    }
}

/// Free-form intake submitted by a caller before interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IntakeRequest {
    #[serde(default, alias = "requesterEmail")]
    pub requester: Option<String>,
    #[serde(default, alias = "awsAccount")]
    pub account: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub duration_hours: Option<u32>,
    #[serde(default)]
    pub prior_context: Option<String>,
}

impl Validate for IntakeRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("intake_request.reason", &self.reason, MAX_DESCRIPTION_LEN)?;
        if let Some(context) = &self.prior_context {
            if context.len() > MAX_DESCRIPTION_LEN {
                return Err(ContractViolation::InvalidValue {
                    field: "intake_request.prior_context",
                    reason: "exceeds max length",
                });
            }
        }
        Ok(())
    }
}

/// Outbound body sent to the interpretation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretRequest {
    pub correlation_id: CorrelationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_context: Option<String>,
}

impl InterpretRequest {
    pub fn from_intake_v1(
        correlation_id: CorrelationId,
        intake: &IntakeRequest,
    ) -> Result<Self, ContractViolation> {
        intake.validate()?;
        let r = Self {
            correlation_id,
            requester: intake.requester.clone(),
            account: intake.account.clone(),
            reason: intake.reason.clone(),
            duration_hours: intake.duration_hours,
            prior_context: intake.prior_context.clone(),
        };
        r.correlation_id.validate()?;
        Ok(r)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupQuestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub question: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretPartialData {
    #[serde(default, alias = "requesterEmail", skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(default, alias = "awsAccount", skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    #[serde(default, alias = "resourceArns", skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,
}

/// Collaborator response. Accepts both the current field names and the historical
/// `requesterEmail` / `awsAccount` / `resourceArns` / `followupQuestion` spellings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretResponse {
    pub need_followup: bool,
    #[serde(
        default,
        alias = "followupQuestion",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub followup_questions: Vec<FollowupQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_data: Option<InterpretPartialData>,
    #[serde(default, alias = "requesterEmail", skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(default, alias = "awsAccount", skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<String>>,
    #[serde(default, alias = "resourceArns", skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hours: Option<u32>,
}

impl InterpretResponse {
    pub fn followup_v1(questions: Vec<FollowupQuestion>) -> Self {
        Self {
            need_followup: true,
            followup_questions: questions,
            partial_data: None,
            requester: None,
            account: None,
            reason: None,
            services: None,
            resources: None,
            duration_hours: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::Many(v)) => v,
        Some(OneOrMany::One(v)) => vec![v],
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupPayload {
    pub correlation_id: CorrelationId,
    pub questions: Vec<FollowupQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<InterpretPartialData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntakeOutcome {
    Followup(FollowupPayload),
    Created(AccessRequestRecord),
}
