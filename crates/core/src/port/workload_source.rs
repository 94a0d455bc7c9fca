// Workload Source Port - outcomes and suspend flags reported by the job controller

use crate::domain::{QueueUnitPhase, UnitId};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Outcome reported for the work object behind a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum JobOutcome {
    /// Actuator bound the work (Dequeued -> Running)
    Bound,
    Succeeded,
    Failed(String),
    /// Work did not make progress in time
    TimedOut,
    /// Backoff elapsed, unit may compete again
    RetryReleased,
    /// Bound consumer object no longer exists
    ConsumerNotFound,
    /// Consumer exists but reports no status
    StatusNotFound,
}

impl JobOutcome {
    /// Target phase and condition reason for this outcome
    pub fn transition(&self) -> (QueueUnitPhase, &'static str) {
        match self {
            JobOutcome::Bound => (QueueUnitPhase::Running, "Bound"),
            JobOutcome::Succeeded => (QueueUnitPhase::Succeed, "JobSucceeded"),
            JobOutcome::Failed(_) => (QueueUnitPhase::Failed, "JobFailed"),
            JobOutcome::TimedOut => (QueueUnitPhase::Backoff, "Timeout"),
            JobOutcome::RetryReleased => (QueueUnitPhase::Enqueued, "RetryReleased"),
            JobOutcome::ConsumerNotFound => (QueueUnitPhase::JobNotFound, "JobNotFound"),
            JobOutcome::StatusNotFound => (QueueUnitPhase::JobStatusNotFound, "JobStatusNotFound"),
        }
    }

    /// Human readable message for the condition record
    pub fn message(&self) -> String {
        match self {
            JobOutcome::Bound => "work bound by actuator".to_string(),
            JobOutcome::Succeeded => "work completed successfully".to_string(),
            JobOutcome::Failed(msg) => msg.clone(),
            JobOutcome::TimedOut => "work timed out".to_string(),
            JobOutcome::RetryReleased => "released for retry".to_string(),
            JobOutcome::ConsumerNotFound => "bound consumer object not found".to_string(),
            JobOutcome::StatusNotFound => "bound consumer object has no status".to_string(),
        }
    }
}

/// One reported outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobObservation {
    pub unit: UnitId,
    pub outcome: JobOutcome,
}

impl JobObservation {
    pub fn new(unit: impl Into<String>, outcome: JobOutcome) -> Self {
        Self {
            unit: unit.into(),
            outcome,
        }
    }
}

/// Everything the job controller reported since the last poll
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadSnapshot {
    /// Outcomes in report order
    pub outcomes: Vec<JobObservation>,
    /// Units whose work object is currently suspended
    pub suspended: BTreeSet<UnitId>,
}

/// Job controller port, polled once before every cycle
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    async fn poll(&self) -> Result<WorkloadSnapshot>;
}
