// Seed file loading (JSON: {"queues": [...], "units": [...]})

use admit_core::domain::{Queue, QueueUnit};
use admit_core::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Initial objects for the in-memory control plane
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub queues: Vec<Queue>,
    pub units: Vec<QueueUnit>,
}

/// Read a seed file
///
/// # Errors
/// - `Io` if the file cannot be read
/// - `Serialization` if it is not a valid seed document
pub async fn load_seed(path: &Path) -> Result<Seed> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let seed: Seed = serde_json::from_str(&raw)?;
    info!(
        path = %path.display(),
        queues = seed.queues.len(),
        units = seed.units.len(),
        "Seed loaded"
    );
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use admit_core::domain::{QueuePolicy, QueueUnitPhase};

    const SEED: &str = r#"{
        "queues": [
            {"name": "q1", "spec": {"queuePolicy": "Priority", "capability": {"cpu": "4", "memory": "8Gi"}}}
        ],
        "units": [
            {"name": "u1", "createdAt": 100, "spec": {"queue": "q1", "priority": 10, "resource": {"cpu": 3}}},
            {"name": "u2", "createdAt": 200, "spec": {"queue": "q1", "priorityClassName": "batch", "resource": {"cpu": "500m"}}}
        ]
    }"#;

    #[tokio::test]
    async fn test_load_seed_from_file() {
        let path = std::env::temp_dir().join(format!("admit-seed-{}.json", std::process::id()));
        tokio::fs::write(&path, SEED).await.unwrap();

        let seed = load_seed(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.ok();

        assert_eq!(seed.queues[0].spec.policy, QueuePolicy::Priority);
        assert_eq!(seed.queues[0].spec.capability.amount("cpu").milli(), 4000);
        assert_eq!(seed.units[0].spec.resource.amount("cpu").milli(), 3000);
        assert_eq!(seed.units[1].spec.resource.amount("cpu").milli(), 500);
        assert_eq!(seed.units[1].phase(), QueueUnitPhase::Enqueued);
    }

    #[tokio::test]
    async fn test_missing_seed_is_io_error() {
        let err = load_seed(Path::new("/nonexistent/admit-seed.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }
}
