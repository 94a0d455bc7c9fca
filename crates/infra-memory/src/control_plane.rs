// In-memory ControlPlane Implementation

use admit_core::domain::{Queue, QueueStatus, QueueUnit, QueueUnitStatus};
use admit_core::error::{AppError, Result};
use admit_core::port::ControlPlane;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::Seed;

/// System of record kept in process memory.
///
/// Plays both sides: the job controller creates and deletes objects through
/// the inherent methods, the engine reads and writes through `ControlPlane`.
#[derive(Default)]
pub struct InMemoryControlPlane {
    queues: RwLock<BTreeMap<String, Queue>>,
    units: RwLock<BTreeMap<String, QueueUnit>>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: Seed) -> Self {
        let queues = seed
            .queues
            .into_iter()
            .map(|q| (q.name.clone(), q))
            .collect();
        let units = seed
            .units
            .into_iter()
            .map(|u| (u.name.clone(), u))
            .collect();
        Self {
            queues: RwLock::new(queues),
            units: RwLock::new(units),
        }
    }

    /// Create or replace a queue
    pub async fn apply_queue(&self, queue: Queue) {
        self.queues.write().await.insert(queue.name.clone(), queue);
    }

    pub async fn delete_queue(&self, name: &str) -> Option<Queue> {
        self.queues.write().await.remove(name)
    }

    /// Create a unit, or replace its spec keeping the stored status
    pub async fn apply_unit(&self, unit: QueueUnit) {
        let mut units = self.units.write().await;
        match units.get_mut(&unit.name) {
            Some(existing) => existing.spec = unit.spec,
            None => {
                units.insert(unit.name.clone(), unit);
            }
        }
    }

    pub async fn delete_unit(&self, name: &str) -> Option<QueueUnit> {
        self.units.write().await.remove(name)
    }

    pub async fn queue(&self, name: &str) -> Option<Queue> {
        self.queues.read().await.get(name).cloned()
    }

    pub async fn unit(&self, name: &str) -> Option<QueueUnit> {
        self.units.read().await.get(name).cloned()
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn list_queues(&self) -> Result<Vec<Queue>> {
        Ok(self.queues.read().await.values().cloned().collect())
    }

    async fn list_units(&self) -> Result<Vec<QueueUnit>> {
        Ok(self.units.read().await.values().cloned().collect())
    }

    async fn update_unit_status(&self, name: &str, status: &QueueUnitStatus) -> Result<()> {
        let mut units = self.units.write().await;
        let unit = units
            .get_mut(name)
            .ok_or_else(|| AppError::NotFound(format!("queue unit {}", name)))?;
        unit.status = status.clone();
        debug!(unit = %name, phase = %status.phase, "Unit status stored");
        Ok(())
    }

    async fn update_queue_status(&self, name: &str, status: &QueueStatus) -> Result<()> {
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(name)
            .ok_or_else(|| AppError::NotFound(format!("queue {}", name)))?;
        queue.status = status.clone();
        Ok(())
    }
}
