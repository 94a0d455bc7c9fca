// Queue Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::error::{DomainError, Result};
use crate::domain::resource::ResourceList;

/// Queue identifier
pub type QueueId = String;

/// Maximum object name length (DNS subdomain)
pub const MAX_NAME_LEN: usize = 253;

/// Ordering policy for the units of a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueuePolicy {
    /// Submission time ascending
    #[default]
    #[serde(rename = "FIFO")]
    Fifo,
    /// Effective priority descending, then submission time
    Priority,
}

impl std::fmt::Display for QueuePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueuePolicy::Fifo => write!(f, "FIFO"),
            QueuePolicy::Priority => write!(f, "Priority"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSpec {
    #[serde(default, rename = "queuePolicy")]
    pub policy: QueuePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
    #[serde(default)]
    pub capability: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    #[serde(default)]
    pub allocated: ResourceList,
}

/// A named admission gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub name: QueueId,
    #[serde(default)]
    pub spec: QueueSpec,
    #[serde(default)]
    pub status: QueueStatus,
}

impl Queue {
    pub fn new(name: impl Into<String>, policy: QueuePolicy, capability: ResourceList) -> Self {
        Self {
            name: name.into(),
            spec: QueueSpec {
                policy,
                capability,
                ..Default::default()
            },
            status: QueueStatus::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }
}

/// Validate a queue or unit name: non-empty, bounded, lowercase DNS-ish characters
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DomainError::ValidationError("name is empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(DomainError::ValidationError(format!(
            "name too long ({} > {})",
            name.len(),
            MAX_NAME_LEN
        )));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    if !valid {
        return Err(DomainError::ValidationError(format!(
            "name {:?} must contain only lowercase alphanumerics, '-' or '.'",
            name
        )));
    }
    Ok(())
}
