// Application Layer - admission use cases

pub mod admission;
pub mod backoff;
pub mod ledger;
pub mod orderer;
pub mod service;
pub mod state_machine;
pub mod store;

// Re-exports
pub use admission::{AdmissionController, CycleReport, SyncOutcome, UnitFault};
pub use backoff::{BackoffDecision, BackoffPolicy};
pub use ledger::{Admission, CapacityLedger, Denial};
pub use orderer::PriorityOrderer;
pub use service::{shutdown_channel, AdmissionService, CycleOutcome, ShutdownSender, ShutdownToken};
pub use state_machine::{Transition, TransitionOutcome, UnitStateMachine};
pub use store::{OrderedUnits, QueueEntry, QueueStore, SyncReport};
