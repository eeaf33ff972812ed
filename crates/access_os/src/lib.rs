#![forbid(unsafe_code)]

pub mod artifacts;
pub mod clock;
pub mod config;
pub mod error;
pub mod intake;
pub mod lifecycle;
pub mod sweeper;

pub use artifacts::AccessArtifactRuntime;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AccessWorkflowConfig, ApproverConfig, ConfigError};
pub use error::AccessError;
pub use intake::IntakeOrchestrator;
pub use lifecycle::AccessLifecycleRuntime;
pub use sweeper::{ExpirySweeper, SweepPassReport, SweeperHandle};
