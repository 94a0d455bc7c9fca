// In-memory WorkloadSource - outcomes and suspend flags from the job controller

use admit_core::error::Result;
use admit_core::port::{JobObservation, JobOutcome, WorkloadSnapshot, WorkloadSource};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct WorkloadState {
    pending: Vec<JobObservation>,
    suspended: BTreeSet<String>,
}

/// Job controller stand-in. Outcomes are delivered once, on the next poll;
/// suspend flags persist until resumed.
#[derive(Default)]
pub struct InMemoryWorkloads {
    state: Mutex<WorkloadState>,
}

impl InMemoryWorkloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn report(&self, unit: impl Into<String>, outcome: JobOutcome) {
        let observation = JobObservation::new(unit, outcome);
        debug!(unit = %observation.unit, outcome = ?observation.outcome, "Outcome reported");
        self.state.lock().await.pending.push(observation);
    }

    pub async fn suspend(&self, unit: impl Into<String>) {
        self.state.lock().await.suspended.insert(unit.into());
    }

    pub async fn resume(&self, unit: &str) {
        self.state.lock().await.suspended.remove(unit);
    }
}

#[async_trait]
impl WorkloadSource for InMemoryWorkloads {
    async fn poll(&self) -> Result<WorkloadSnapshot> {
        let mut state = self.state.lock().await;
        Ok(WorkloadSnapshot {
            outcomes: std::mem::take(&mut state.pending),
            suspended: state.suspended.clone(),
        })
    }
}
