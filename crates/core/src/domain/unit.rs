// QueueUnit Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::Result;
use crate::domain::phase::QueueUnitPhase;
use crate::domain::queue::{validate_name, QueueId};
use crate::domain::resource::ResourceList;

/// Queue unit identifier
pub type UnitId = String;

/// Status of a condition record, one of True, False, Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Opaque reference to the work object an admitted unit binds to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUnitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_ref: Option<ConsumerRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    pub queue: QueueId,
    #[serde(default)]
    pub resource: ResourceList,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
}

/// One record of the append-only transition log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUnitCondition {
    #[serde(rename = "queueUnitPhase")]
    pub phase: QueueUnitPhase,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    /// epoch ms, advances on every observation
    pub last_update_time: i64,
    /// epoch ms, advances only when the phase changes
    pub last_transition_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUnitStatus {
    #[serde(default)]
    pub conditions: Vec<QueueUnitCondition>,
    #[serde(default)]
    pub phase: QueueUnitPhase,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub last_update_time: Option<i64>,
    #[serde(default)]
    pub position: String,
}

impl QueueUnitStatus {
    /// Most recent condition record
    pub fn latest_condition(&self) -> Option<&QueueUnitCondition> {
        self.conditions.last()
    }

    /// Time the current phase was entered, if recorded
    pub fn phase_since(&self) -> Option<i64> {
        self.conditions
            .iter()
            .rev()
            .find(|c| c.phase == self.phase)
            .map(|c| c.last_transition_time)
    }

    /// Number of times the unit entered `phase`
    pub fn times_entered(&self, phase: QueueUnitPhase) -> usize {
        self.conditions
            .iter()
            .filter(|c| c.phase == phase && c.status == ConditionStatus::True)
            .count()
    }
}

/// One admission ticket for a piece of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueUnit {
    pub name: UnitId,
    /// epoch ms, submission time used for FIFO ordering
    pub created_at: i64,
    pub spec: QueueUnitSpec,
    #[serde(default)]
    pub status: QueueUnitStatus,
}

impl QueueUnit {
    /// Create a new unit in phase Enqueued
    ///
    /// # Arguments
    ///
    /// * `name` - Unique unit name
    /// * `created_at` - Submission time in epoch ms (injected, not system time)
    /// * `queue` - Name of the owning queue
    /// * `resource` - Resources required for admission
    pub fn new(
        name: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        resource: ResourceList,
    ) -> Self {
        Self {
            name: name.into(),
            created_at,
            spec: QueueUnitSpec {
                queue: queue.into(),
                resource,
                ..Default::default()
            },
            status: QueueUnitStatus::default(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.spec.priority = Some(priority);
        self
    }

    pub fn with_priority_class(mut self, class: impl Into<String>) -> Self {
        self.spec.priority_class_name = Some(class.into());
        self
    }

    pub fn with_consumer(mut self, consumer: ConsumerRef) -> Self {
        self.spec.consumer_ref = Some(consumer);
        self
    }

    pub fn phase(&self) -> QueueUnitPhase {
        self.status.phase
    }

    pub fn queue(&self) -> &str {
        &self.spec.queue
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_name(&self.spec.queue)
    }
}
