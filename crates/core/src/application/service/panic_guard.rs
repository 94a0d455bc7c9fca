// Panic isolation for per-queue admission walks
use std::panic::{catch_unwind, UnwindSafe};
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed successfully
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Execute a closure with panic isolation
///
/// A panic inside one queue's walk is caught and returned as
/// `PanicGuardResult::Panicked` so the remaining queues still run.
pub fn execute_guarded<F, T>(scope: &str, f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T + UnwindSafe,
{
    match catch_unwind(f) {
        Ok(result) => PanicGuardResult::Success(result),
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };

            error!(scope = %scope, panic_msg = %panic_msg, "Admission walk panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}
