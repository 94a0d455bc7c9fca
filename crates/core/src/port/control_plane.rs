// Control Plane Port (Interface)

use crate::domain::{Queue, QueueStatus, QueueUnit, QueueUnitStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Snapshot read and status write-back against the system of record.
///
/// The engine never assumes a storage layout; it pulls every object in
/// bulk before a cycle and pushes status changes after it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// List all queues
    async fn list_queues(&self) -> Result<Vec<Queue>>;

    /// List all queue units
    async fn list_units(&self) -> Result<Vec<QueueUnit>>;

    /// Persist phase, conditions, message and position of a unit
    async fn update_unit_status(&self, name: &str, status: &QueueUnitStatus) -> Result<()>;

    /// Persist the allocated status of a queue
    async fn update_queue_status(&self, name: &str, status: &QueueStatus) -> Result<()>;
}
