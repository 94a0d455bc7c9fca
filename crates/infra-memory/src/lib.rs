// Admit Infrastructure - In-Memory Adapters
// Implements: ControlPlane, WorkloadSource, PlacementSink, PriorityClassResolver

mod control_plane;
mod placement;
mod priority_class;
mod seed;
mod workload;

pub use control_plane::InMemoryControlPlane;
pub use placement::{RecordingPlacementSink, TracingPlacementSink};
pub use priority_class::StaticPriorityClassResolver;
pub use seed::{load_seed, Seed};
pub use workload::InMemoryWorkloads;
