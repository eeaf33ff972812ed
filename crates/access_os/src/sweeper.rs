#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use access_kernel_contracts::access_request::AccessRequestStatus;
use access_storage::{AccessRequestStore, CasOutcome};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::AccessError;
use crate::lifecycle::expire_record;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepPassReport {
    pub scanned: usize,
    pub expired: usize,
    pub already_settled: usize,
    pub failed: usize,
}

/// Moves approved requests past their window to `EXPIRED`, independent of reads.
pub struct ExpirySweeper {
    store: Arc<dyn AccessRequestStore>,
    clock: Arc<dyn Clock>,
}

impl ExpirySweeper {
    pub fn new(store: Arc<dyn AccessRequestStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn run_pass(&self) -> Result<SweepPassReport, AccessError> {
        let now = self.clock.now();
        let mut report = SweepPassReport::default();
        for row in self.store.list_by_status(AccessRequestStatus::DevopsApproved)? {
            report.scanned += 1;
            if !row.is_expired_at(now) {
                continue;
            }
            match expire_record(self.store.as_ref(), &row, now) {
                Ok(CasOutcome::Applied(_)) => report.expired += 1,
                Ok(CasOutcome::Conflict(current)) => {
                    debug!(request_id = %current.id, status = %current.status, "sweep skipped settled request");
                    report.already_settled += 1;
                }
                Err(err) => {
                    warn!(request_id = %row.id, code = err.code(), error = %err, "sweep could not expire request");
                    report.failed += 1;
                }
            }
        }
        if report.expired > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                expired = report.expired,
                already_settled = report.already_settled,
                failed = report.failed,
                "expiry sweep pass"
            );
        }
        Ok(report)
    }

    /// Runs a pass every `period` on its own tokio task. Must be called inside a runtime.
    pub fn spawn_periodic(self: Arc<Self>, period: Duration) -> SweeperHandle {
        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(err) = self.run_pass() {
                    warn!(code = err.code(), error = %err, "expiry sweep pass failed");
                }
            }
        });
        SweeperHandle { join }
    }
}

#[derive(Debug)]
pub struct SweeperHandle {
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
