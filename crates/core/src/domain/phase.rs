// QueueUnit lifecycle phases and the transition table

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a queue unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueUnitPhase {
    #[default]
    Enqueued,
    Dequeued,
    /// Bound and scheduled (SchedReady)
    Running,
    Succeed,
    Failed,
    #[serde(rename = "TimeoutBackoff")]
    Backoff,
    #[serde(rename = "RelatedJobNotFound")]
    JobNotFound,
    JobStatusNotFound,
}

impl QueueUnitPhase {
    /// Wire name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueUnitPhase::Enqueued => "Enqueued",
            QueueUnitPhase::Dequeued => "Dequeued",
            QueueUnitPhase::Running => "Running",
            QueueUnitPhase::Succeed => "Succeed",
            QueueUnitPhase::Failed => "Failed",
            QueueUnitPhase::Backoff => "TimeoutBackoff",
            QueueUnitPhase::JobNotFound => "RelatedJobNotFound",
            QueueUnitPhase::JobStatusNotFound => "JobStatusNotFound",
        }
    }

    /// Succeed and Failed are sinks
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueUnitPhase::Succeed | QueueUnitPhase::Failed)
    }

    /// Phases in which the unit holds queue capacity
    pub fn holds_resources(&self) -> bool {
        matches!(self, QueueUnitPhase::Dequeued | QueueUnitPhase::Running)
    }

    /// Legal edges of the lifecycle
    pub fn can_transition_to(&self, target: QueueUnitPhase) -> bool {
        use QueueUnitPhase::*;
        matches!(
            (self, target),
            (Enqueued, Dequeued)
                | (Dequeued, Running)
                | (Running, Succeed)
                | (Running, Failed)
                | (Running, JobNotFound)
                | (Running, JobStatusNotFound)
                | (Dequeued, Backoff)
                | (Running, Backoff)
                | (Backoff, Enqueued)
        )
    }
}

impl std::fmt::Display for QueueUnitPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
