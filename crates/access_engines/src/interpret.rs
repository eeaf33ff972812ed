#![forbid(unsafe_code)]

use std::time::Duration;

use access_kernel_contracts::intake::{CorrelationId, InterpretRequest, InterpretResponse};
use access_kernel_contracts::ContractViolation;
use rand::Rng;
use thiserror::Error;

pub const INTERPRET_PATH: &str = "/api/v1/llm/interpret";
pub const DEFAULT_INTERPRET_BASE_URL: &str = "http://localhost:9000";
pub const DEFAULT_INTERPRET_TIMEOUT_MS: u32 = 10_000;
const USER_AGENT: &str = "access-workflow/0.1";
const MAX_DETAIL_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Timeout,
    Connection,
    Tls,
    Dns,
    HttpStatus,
    Decode,
    Transport,
}

impl TransportErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connection => "connection",
            Self::Tls => "tls",
            Self::Dns => "dns",
            Self::HttpStatus => "http_status",
            Self::Decode => "decode",
            Self::Transport => "transport",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("interpretation call failed kind={} detail={detail}", .kind.as_str())]
pub struct InterpretTransportError {
    pub kind: TransportErrorKind,
    pub detail: String,
}

impl InterpretTransportError {
    pub fn new(kind: TransportErrorKind, detail: impl Into<String>) -> Self {
        let mut detail: String = detail.into();
        if detail.len() > MAX_DETAIL_LEN {
            let mut cut = MAX_DETAIL_LEN;
            while !detail.is_char_boundary(cut) {
                cut -= 1;
            }
            detail.truncate(cut);
        }
        Self { kind, detail }
    }
}

/// Seam to the external natural-language interpretation service.
pub trait InterpretationClient: Send + Sync {
    fn interpret(
        &self,
        req: &InterpretRequest,
    ) -> Result<InterpretResponse, InterpretTransportError>;
}

pub fn fresh_correlation_id() -> Result<CorrelationId, ContractViolation> {
    let raw: u128 = rand::thread_rng().gen();
    CorrelationId::new(format!("corr_{raw:032x}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpInterpretationClientConfig {
    pub base_url: String,
    pub timeout_ms: u32,
}

impl HttpInterpretationClientConfig {
    pub fn mvp_v1() -> Self {
        Self {
            base_url: DEFAULT_INTERPRET_BASE_URL.to_string(),
            timeout_ms: DEFAULT_INTERPRET_TIMEOUT_MS,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), INTERPRET_PATH)
    }
}

/// Blocking ureq client; the whole exchange, body included, is bounded by `timeout_ms`.
#[derive(Debug, Clone)]
pub struct HttpInterpretationClient {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpInterpretationClient {
    pub fn new(config: &HttpInterpretationClientConfig) -> Result<Self, ContractViolation> {
        if config.timeout_ms == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "http_interpretation_client_config.timeout_ms",
                reason: "must be > 0",
            });
        }
        let base = config.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ContractViolation::InvalidValue {
                field: "http_interpretation_client_config.base_url",
                reason: "must start with http:// or https://",
            });
        }
        let timeout = Duration::from_millis(u64::from(config.timeout_ms));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .try_proxy_from_env(false)
            .build();
        Ok(Self {
            agent,
            endpoint: config.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl InterpretationClient for HttpInterpretationClient {
    fn interpret(
        &self,
        req: &InterpretRequest,
    ) -> Result<InterpretResponse, InterpretTransportError> {
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Accept", "application/json")
            .send_json(req)
            .map_err(transport_error_from_ureq)?;
        let body = response.into_string().map_err(transport_error_from_io)?;
        serde_json::from_str(&body).map_err(|e| {
            InterpretTransportError::new(TransportErrorKind::Decode, format!("json_parse: {e}"))
        })
    }
}

fn transport_error_from_io(err: std::io::Error) -> InterpretTransportError {
    let detail = format!("body_read: {err}");
    let kind = match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => TransportErrorKind::Timeout,
        std::io::ErrorKind::InvalidData => TransportErrorKind::Decode,
        _ => classify_transport_error_kind(&detail),
    };
    InterpretTransportError::new(kind, detail)
}

fn transport_error_from_ureq(err: ureq::Error) -> InterpretTransportError {
    match err {
        ureq::Error::Status(status, _) => InterpretTransportError::new(
            TransportErrorKind::HttpStatus,
            format!("http_non_2xx status={status}"),
        ),
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            InterpretTransportError::new(classify_transport_error_kind(&combined), combined)
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> TransportErrorKind {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        TransportErrorKind::Timeout
    } else if lower.contains("tls") || lower.contains("ssl") {
        TransportErrorKind::Tls
    } else if lower.contains("dns") {
        TransportErrorKind::Dns
    } else if lower.contains("connection") || lower.contains("connect") {
        TransportErrorKind::Connection
    } else {
        TransportErrorKind::Transport
    }
}
