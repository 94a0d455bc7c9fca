// PlacementSink adapters

use admit_core::domain::Placement;
use admit_core::error::Result;
use admit_core::port::PlacementSink;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

/// Keeps every placement it receives, in order
#[derive(Default)]
pub struct RecordingPlacementSink {
    placements: Mutex<Vec<Placement>>,
}

impl RecordingPlacementSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn placements(&self) -> Vec<Placement> {
        self.placements.lock().await.clone()
    }

    /// Remove and return everything received so far
    pub async fn take(&self) -> Vec<Placement> {
        std::mem::take(&mut *self.placements.lock().await)
    }
}

#[async_trait]
impl PlacementSink for RecordingPlacementSink {
    async fn place(&self, placement: &Placement) -> Result<()> {
        self.placements.lock().await.push(placement.clone());
        Ok(())
    }
}

/// Logs placements; the daemon's default actuator
pub struct TracingPlacementSink;

#[async_trait]
impl PlacementSink for TracingPlacementSink {
    async fn place(&self, placement: &Placement) -> Result<()> {
        info!(
            queue = %placement.queue,
            unit = %placement.unit,
            rank = placement.rank,
            consumer = ?placement.consumer_ref.as_ref().map(|c| c.name.as_str()),
            "Placement dispatched"
        );
        Ok(())
    }
}
