// Actuator Port - consumer of placement decisions

use crate::domain::Placement;
use crate::error::Result;
use async_trait::async_trait;

/// Receives admission decisions for work that is not suspended
#[async_trait]
pub trait PlacementSink: Send + Sync {
    async fn place(&self, placement: &Placement) -> Result<()>;
}
