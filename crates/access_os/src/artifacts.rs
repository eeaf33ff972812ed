#![forbid(unsafe_code)]

use std::sync::Arc;

use access_engines::command::CommandFormatter;
use access_engines::policy::{PolicySynthesisRuntime, SynthesizedPolicy};
use access_kernel_contracts::access_request::AccessRequestId;
use access_kernel_contracts::policy::{PermissionDocument, PolicyExport};

use crate::error::AccessError;
use crate::lifecycle::AccessLifecycleRuntime;

/// Read-only view turning an approved request into operator-facing artifacts.
pub struct AccessArtifactRuntime {
    lifecycle: Arc<AccessLifecycleRuntime>,
    synthesizer: PolicySynthesisRuntime,
    formatter: CommandFormatter,
}

impl AccessArtifactRuntime {
    pub fn new(lifecycle: Arc<AccessLifecycleRuntime>, formatter: CommandFormatter) -> Self {
        Self {
            lifecycle,
            synthesizer: PolicySynthesisRuntime,
            formatter,
        }
    }

    pub fn permission_document(&self, id: AccessRequestId) -> Result<PermissionDocument, AccessError> {
        Ok(self.synthesize(id)?.into_document())
    }

    pub fn policy_export(&self, id: AccessRequestId) -> Result<PolicyExport, AccessError> {
        Ok(self.synthesize(id)?.export()?)
    }

    pub fn cli_command(&self, id: AccessRequestId) -> Result<String, AccessError> {
        let policy = self.synthesize(id)?;
        Ok(self.formatter.format(&policy)?)
    }

    fn synthesize(&self, id: AccessRequestId) -> Result<SynthesizedPolicy, AccessError> {
        let row = self.lifecycle.get(id)?;
        Ok(self.synthesizer.synthesize(&row, self.lifecycle.now())?)
    }
}
