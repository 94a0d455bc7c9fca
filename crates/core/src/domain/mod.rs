// Domain Layer - Pure business logic and entities

pub mod error;
pub mod phase;
pub mod placement;
pub mod queue;
pub mod resource;
pub mod unit;

// Re-exports
pub use error::DomainError;
pub use phase::QueueUnitPhase;
pub use placement::Placement;
pub use queue::{Queue, QueueId, QueuePolicy, QueueSpec, QueueStatus};
pub use resource::{resources, Quantity, ResourceList, ResourceName};
pub use unit::{
    ConditionStatus, ConsumerRef, QueueUnit, QueueUnitCondition, QueueUnitSpec, QueueUnitStatus,
    UnitId,
};
