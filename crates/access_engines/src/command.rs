#![forbid(unsafe_code)]

use access_kernel_contracts::policy::{policy_filename, policy_name};

use crate::policy::{PolicySynthesisError, SynthesizedPolicy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyDocumentMode {
    /// `--policy-document file://policy-<id>.json`; pairs with the download route.
    #[default]
    FileReference,
    /// Compact JSON embedded in a single-quoted shell argument.
    Inline,
}

impl PolicyDocumentMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" | "file_reference" => Some(Self::FileReference),
            "inline" => Some(Self::Inline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileReference => "file",
            Self::Inline => "inline",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct CommandFormatter {
    mode: PolicyDocumentMode,
}

impl CommandFormatter {
    pub fn new(mode: PolicyDocumentMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> PolicyDocumentMode {
        self.mode
    }

    pub fn format(&self, policy: &SynthesizedPolicy) -> Result<String, PolicySynthesisError> {
        let id = policy.request_id();
        let document_arg = match self.mode {
            PolicyDocumentMode::FileReference => format!("file://{}", policy_filename(id)),
            PolicyDocumentMode::Inline => {
                shell_single_quote(&serde_json::to_string(policy.document())?)
            }
        };
        Ok(format!(
            "aws iam create-policy --policy-name {} --policy-document {}",
            policy_name(id),
            document_arg
        ))
    }
}

fn shell_single_quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}
