// Port Layer - Interfaces for external collaborators

pub mod actuator;
pub mod control_plane;
pub mod id_provider; // For deterministic testing
pub mod priority_class;
pub mod time_provider;
pub mod workload_source;

// Re-exports
pub use actuator::PlacementSink;
pub use control_plane::ControlPlane;
pub use id_provider::{IdProvider, UuidProvider};
pub use priority_class::{NoPriorityClasses, PriorityClassResolver};
pub use time_provider::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
pub use workload_source::{JobObservation, JobOutcome, WorkloadSnapshot, WorkloadSource};
