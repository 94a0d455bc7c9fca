// Placement decision emitted to the actuator

use serde::{Deserialize, Serialize};

use crate::domain::queue::QueueId;
use crate::domain::unit::{ConsumerRef, UnitId};

/// Admission decision: `unit` was admitted under `queue` at `rank`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub queue: QueueId,
    pub unit: UnitId,
    /// 1-based rank within the queue's ordering when admitted
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_ref: Option<ConsumerRef>,
    /// Work object is suspended; the actuator must not act yet
    #[serde(default)]
    pub suspended: bool,
}
