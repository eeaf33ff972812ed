#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use access_engines::command::PolicyDocumentMode;
use access_engines::interpret::{
    HttpInterpretationClientConfig, DEFAULT_INTERPRET_BASE_URL, DEFAULT_INTERPRET_TIMEOUT_MS,
};
use access_kernel_contracts::access_request::{
    ApprovalStage, DEFAULT_DURATION_HOURS, MAX_DURATION_HOURS,
};
use thiserror::Error;

pub const ENV_MANAGER_APPROVER: &str = "ACCESS_MANAGER_APPROVER";
pub const ENV_DEVOPS_APPROVER: &str = "ACCESS_DEVOPS_APPROVER";
pub const ENV_DEFAULT_DURATION_HOURS: &str = "ACCESS_DEFAULT_DURATION_HOURS";
pub const ENV_SWEEP_INTERVAL_SECS: &str = "ACCESS_SWEEP_INTERVAL_SECS";
pub const ENV_INTERPRET_BASE_URL: &str = "ACCESS_INTERPRET_BASE_URL";
pub const ENV_INTERPRET_TIMEOUT_MS: &str = "ACCESS_INTERPRET_TIMEOUT_MS";
pub const ENV_CLI_POLICY_DOCUMENT_MODE: &str = "ACCESS_CLI_POLICY_DOCUMENT_MODE";

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;
const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;
const MAX_INTERPRET_TIMEOUT_MS: u32 = 120_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Identities stamped on approve/reject decisions for each stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproverConfig {
    pub manager: String,
    pub devops: String,
}

impl ApproverConfig {
    pub fn mvp_v1() -> Self {
        Self {
            manager: "manager@company.com".to_string(),
            devops: "devops@company.com".to_string(),
        }
    }

    pub fn for_stage(&self, stage: ApprovalStage) -> &str {
        match stage {
            ApprovalStage::Manager => &self.manager,
            ApprovalStage::Devops => &self.devops,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessWorkflowConfig {
    pub approvers: ApproverConfig,
    pub default_duration_hours: u32,
    pub sweep_interval: Duration,
    pub interpret: HttpInterpretationClientConfig,
    pub cli_policy_document_mode: PolicyDocumentMode,
}

impl AccessWorkflowConfig {
    pub fn mvp_v1() -> Self {
        Self {
            approvers: ApproverConfig::mvp_v1(),
            default_duration_hours: DEFAULT_DURATION_HOURS,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            interpret: HttpInterpretationClientConfig {
                base_url: DEFAULT_INTERPRET_BASE_URL.to_string(),
                timeout_ms: DEFAULT_INTERPRET_TIMEOUT_MS,
            },
            cli_policy_document_mode: PolicyDocumentMode::FileReference,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_var_map(|k| env::var(k).ok())
    }

    /// Overlays `mvp_v1()` with any non-blank values `lookup` returns.
    pub fn from_env_var_map<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).and_then(trim_non_empty);
        let mut cfg = Self::mvp_v1();

        if let Some(v) = get(ENV_MANAGER_APPROVER) {
            cfg.approvers.manager = v;
        }
        if let Some(v) = get(ENV_DEVOPS_APPROVER) {
            cfg.approvers.devops = v;
        }
        if let Some(v) = get(ENV_DEFAULT_DURATION_HOURS) {
            cfg.default_duration_hours = parse_in_range(
                ENV_DEFAULT_DURATION_HOURS,
                &v,
                1,
                u64::from(MAX_DURATION_HOURS),
            )? as u32;
        }
        if let Some(v) = get(ENV_SWEEP_INTERVAL_SECS) {
            cfg.sweep_interval = Duration::from_secs(parse_in_range(
                ENV_SWEEP_INTERVAL_SECS,
                &v,
                1,
                MAX_SWEEP_INTERVAL_SECS,
            )?);
        }
        if let Some(v) = get(ENV_INTERPRET_BASE_URL) {
            if !(v.starts_with("http://") || v.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    key: ENV_INTERPRET_BASE_URL,
                    value: v,
                    reason: "must start with http:// or https://",
                });
            }
            cfg.interpret.base_url = v;
        }
        if let Some(v) = get(ENV_INTERPRET_TIMEOUT_MS) {
            cfg.interpret.timeout_ms = parse_in_range(
                ENV_INTERPRET_TIMEOUT_MS,
                &v,
                100,
                u64::from(MAX_INTERPRET_TIMEOUT_MS),
            )? as u32;
        }
        if let Some(v) = get(ENV_CLI_POLICY_DOCUMENT_MODE) {
            cfg.cli_policy_document_mode =
                PolicyDocumentMode::parse(&v).ok_or(ConfigError::InvalidValue {
                    key: ENV_CLI_POLICY_DOCUMENT_MODE,
                    value: v.clone(),
                    reason: "expected file or inline",
                })?;
        }
        Ok(cfg)
    }
}

fn trim_non_empty(v: String) -> Option<String> {
    let t = v.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn parse_in_range(key: &'static str, raw: &str, min: u64, max: u64) -> Result<u64, ConfigError> {
    let v = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: "not an unsigned integer",
    })?;
    if !(min..=max).contains(&v) {
        return Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "out of range",
        });
    }
    Ok(v)
}
