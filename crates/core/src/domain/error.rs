// Domain Error Types

use thiserror::Error;

use crate::domain::phase::QueueUnitPhase;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid phase transition for unit {unit}: {from} -> {to}")]
    InvalidTransition {
        unit: String,
        from: QueueUnitPhase,
        to: QueueUnitPhase,
    },

    #[error("Unit {unit} is already terminal ({phase})")]
    AlreadyTerminal { unit: String, phase: QueueUnitPhase },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Queue unit not found: {0}")]
    UnitNotFound(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl DomainError {
    /// Stable reason code recorded on unit conditions
    pub fn reason(&self) -> &'static str {
        match self {
            DomainError::InvalidTransition { .. } => "InvalidTransition",
            DomainError::AlreadyTerminal { .. } => "AlreadyTerminal",
            DomainError::QueueNotFound(_) => "QueueNotFound",
            DomainError::UnitNotFound(_) => "UnitNotFound",
            DomainError::InvalidQuantity(_) => "InvalidQuantity",
            DomainError::ValidationError(_) => "ValidationError",
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
