// Bind timeout and retry backoff for admitted units
use crate::config::BackoffConfig;
use crate::domain::{QueueUnit, QueueUnitPhase};
use crate::port::TimeProvider;
use std::sync::Arc;
use tracing::{debug, info};

/// What the engine should do with a unit on its own clock
#[derive(Debug, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Dequeued for longer than the bind timeout
    BindTimedOut { waited_ms: i64 },
    /// Backoff delay elapsed, unit may compete again
    RetryDue { delay_ms: i64 },
    Wait,
}

/// Time-driven transitions for Dequeued and TimeoutBackoff units
///
/// Retry delay:
/// delay = base_delay * (factor ^ (entries - 1)) * (1.0 ± 0.1), capped at max_delay
///
/// `entries` is how often the unit has entered TimeoutBackoff, read from its
/// condition log, so the delay survives an engine restart.
pub struct BackoffPolicy {
    time_provider: Arc<dyn TimeProvider>,
    bind_timeout_ms: Option<i64>,
    config: BackoffConfig,
}

impl BackoffPolicy {
    pub fn new(
        time_provider: Arc<dyn TimeProvider>,
        bind_timeout_ms: Option<i64>,
        config: BackoffConfig,
    ) -> Self {
        Self {
            time_provider,
            bind_timeout_ms,
            config,
        }
    }

    /// Decide whether `unit` is due for an engine-driven transition
    pub fn evaluate(&self, unit: &QueueUnit) -> BackoffDecision {
        let now = self.time_provider.now_millis();
        let since = match unit.status.phase_since() {
            Some(t) => t,
            None => return BackoffDecision::Wait,
        };
        let waited_ms = now - since;

        match unit.phase() {
            QueueUnitPhase::Dequeued => match self.bind_timeout_ms {
                Some(timeout) if waited_ms >= timeout => {
                    info!(
                        unit = %unit.name,
                        waited_ms = %waited_ms,
                        bind_timeout_ms = %timeout,
                        "Bind timeout exceeded"
                    );
                    BackoffDecision::BindTimedOut { waited_ms }
                }
                _ => BackoffDecision::Wait,
            },
            QueueUnitPhase::Backoff => {
                let delay_ms = self.retry_delay(unit);
                if waited_ms >= delay_ms {
                    debug!(unit = %unit.name, delay_ms = %delay_ms, "Retry delay elapsed");
                    BackoffDecision::RetryDue { delay_ms }
                } else {
                    BackoffDecision::Wait
                }
            }
            _ => BackoffDecision::Wait,
        }
    }

    /// Delay before a unit in TimeoutBackoff is released again
    pub fn retry_delay(&self, unit: &QueueUnit) -> i64 {
        let entries = unit.status.times_entered(QueueUnitPhase::Backoff).max(1);
        let exponent = i32::try_from(entries - 1).unwrap_or(i32::MAX);
        let base_delay_ms = self.config.base_delay_ms as f64 * self.config.factor.powi(exponent);

        // Deterministic jitter per unit name
        let jitter_seed = unit.name.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

        let delay_ms = (base_delay_ms * jitter_factor).min(self.config.max_delay_ms as f64);
        (delay_ms as i64).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::state_machine::{Transition, UnitStateMachine};
    use crate::domain::ResourceList;
    use crate::port::ManualTimeProvider;

    fn setup(bind_timeout_ms: Option<i64>) -> (BackoffPolicy, UnitStateMachine, Arc<ManualTimeProvider>) {
        let clock = Arc::new(ManualTimeProvider::new(0));
        let config = BackoffConfig {
            base_delay_ms: 1000,
            factor: 2.0,
            max_delay_ms: 3000,
        };
        (
            BackoffPolicy::new(clock.clone(), bind_timeout_ms, config),
            UnitStateMachine::new(clock.clone()),
            clock,
        )
    }

    fn step(sm: &UnitStateMachine, unit: &mut QueueUnit, target: QueueUnitPhase) {
        sm.apply_transition(unit, Transition::new(target, "step", ""))
            .unwrap();
    }

    #[test]
    fn test_bind_timeout() {
        let (policy, sm, clock) = setup(Some(5_000));
        let mut unit = QueueUnit::new("u1", 0, "q1", ResourceList::new());
        step(&sm, &mut unit, QueueUnitPhase::Dequeued);

        clock.advance(4_999);
        assert_eq!(policy.evaluate(&unit), BackoffDecision::Wait);
        clock.advance(1);
        assert_eq!(
            policy.evaluate(&unit),
            BackoffDecision::BindTimedOut { waited_ms: 5_000 }
        );
    }

    #[test]
    fn test_no_bind_timeout_by_default() {
        let (policy, sm, clock) = setup(None);
        let mut unit = QueueUnit::new("u1", 0, "q1", ResourceList::new());
        step(&sm, &mut unit, QueueUnitPhase::Dequeued);
        clock.advance(1_000_000);
        assert_eq!(policy.evaluate(&unit), BackoffDecision::Wait);
    }

    #[test]
    fn test_retry_delay_grows_and_caps() {
        let (policy, sm, _) = setup(None);
        let mut unit = QueueUnit::new("u1", 0, "q1", ResourceList::new());

        step(&sm, &mut unit, QueueUnitPhase::Dequeued);
        step(&sm, &mut unit, QueueUnitPhase::Backoff);
        let first = policy.retry_delay(&unit);
        assert!((900..=1100).contains(&first));

        step(&sm, &mut unit, QueueUnitPhase::Enqueued);
        step(&sm, &mut unit, QueueUnitPhase::Dequeued);
        step(&sm, &mut unit, QueueUnitPhase::Backoff);
        let second = policy.retry_delay(&unit);
        assert!((1800..=2200).contains(&second));

        for _ in 0..3 {
            step(&sm, &mut unit, QueueUnitPhase::Enqueued);
            step(&sm, &mut unit, QueueUnitPhase::Dequeued);
            step(&sm, &mut unit, QueueUnitPhase::Backoff);
        }
        assert_eq!(policy.retry_delay(&unit), 3000);
    }

    #[test]
    fn test_retry_due_after_delay() {
        let (policy, sm, clock) = setup(None);
        let mut unit = QueueUnit::new("u1", 0, "q1", ResourceList::new());
        step(&sm, &mut unit, QueueUnitPhase::Dequeued);
        step(&sm, &mut unit, QueueUnitPhase::Backoff);

        assert_eq!(policy.evaluate(&unit), BackoffDecision::Wait);
        clock.advance(1_100);
        assert!(matches!(
            policy.evaluate(&unit),
            BackoffDecision::RetryDue { .. }
        ));
    }
}
