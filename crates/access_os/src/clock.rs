#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use access_kernel_contracts::MonotonicTimeNs;

pub trait Clock: Send + Sync {
    fn now(&self) -> MonotonicTimeNs;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> MonotonicTimeNs {
        MonotonicTimeNs(system_time_now_ns())
    }
}

fn system_time_now_ns() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    u64::try_from(nanos).unwrap_or(u64::MAX)
}

/// Test and replay clock; only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now_ns: AtomicU64,
}

impl ManualClock {
    pub fn starting_at(start: MonotonicTimeNs) -> Self {
        Self {
            now_ns: AtomicU64::new(start.0),
        }
    }

    pub fn set(&self, at: MonotonicTimeNs) {
        self.now_ns.store(at.0, Ordering::SeqCst);
    }

    pub fn advance_ns(&self, delta_ns: u64) -> MonotonicTimeNs {
        let prev = self
            .now_ns
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_add(delta_ns))
            })
            .unwrap_or_else(|v| v);
        MonotonicTimeNs(prev.saturating_add(delta_ns))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> MonotonicTimeNs {
        MonotonicTimeNs(self.now_ns.load(Ordering::SeqCst))
    }
}
