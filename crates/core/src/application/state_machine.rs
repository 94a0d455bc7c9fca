//! UnitStateMachine - validates and applies QueueUnit phase changes
//!
//! Every accepted transition appends exactly one condition record. A
//! re-observation of the current phase appends nothing but refreshes the
//! status timestamps and position.

use std::sync::Arc;

use tracing::debug;

use crate::domain::error::{DomainError, Result};
use crate::domain::{ConditionStatus, QueueUnit, QueueUnitCondition, QueueUnitPhase};
use crate::port::TimeProvider;

/// What `apply_transition` did to the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Transitioned {
        from: QueueUnitPhase,
        to: QueueUnitPhase,
    },
    /// Same phase reported again
    Reobserved,
}

/// A requested phase change
#[derive(Debug, Clone)]
pub struct Transition<'a> {
    pub target: QueueUnitPhase,
    pub reason: &'a str,
    pub message: &'a str,
    /// New rank, if the caller knows it
    pub position: Option<usize>,
}

impl<'a> Transition<'a> {
    pub fn new(target: QueueUnitPhase, reason: &'a str, message: &'a str) -> Self {
        Self {
            target,
            reason,
            message,
            position: None,
        }
    }

    pub fn at_position(mut self, rank: usize) -> Self {
        self.position = Some(rank);
        self
    }
}

pub struct UnitStateMachine {
    time_provider: Arc<dyn TimeProvider>,
}

impl UnitStateMachine {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self { time_provider }
    }

    pub fn now_millis(&self) -> i64 {
        self.time_provider.now_millis()
    }

    /// Apply `transition` to `unit`. On error the unit is left unchanged.
    ///
    /// # Errors
    /// - `AlreadyTerminal` if the unit is in Succeed or Failed
    /// - `InvalidTransition` if the edge is not in the lifecycle table
    pub fn apply_transition(
        &self,
        unit: &mut QueueUnit,
        transition: Transition<'_>,
    ) -> Result<TransitionOutcome> {
        let from = unit.status.phase;
        let to = transition.target;

        if from.is_terminal() {
            return Err(DomainError::AlreadyTerminal {
                unit: unit.name.clone(),
                phase: from,
            });
        }

        let now = self.now_millis();

        if from == to {
            self.reobserve(unit, transition.position, None);
            return Ok(TransitionOutcome::Reobserved);
        }

        if !from.can_transition_to(to) {
            return Err(DomainError::InvalidTransition {
                unit: unit.name.clone(),
                from,
                to,
            });
        }

        unit.status.conditions.push(QueueUnitCondition {
            phase: to,
            status: ConditionStatus::True,
            reason: transition.reason.to_string(),
            message: transition.message.to_string(),
            last_update_time: now,
            last_transition_time: now,
        });
        unit.status.phase = to;
        unit.status.message = transition.message.to_string();
        unit.status.last_update_time = Some(now);
        if let Some(rank) = transition.position {
            unit.status.position = rank.to_string();
        }

        debug!(
            unit = %unit.name,
            queue = %unit.spec.queue,
            from = %from,
            to = %to,
            reason = %transition.reason,
            "Unit transitioned"
        );
        Ok(TransitionOutcome::Transitioned { from, to })
    }

    /// Refresh timestamps and position without changing phase or appending a condition
    pub fn reobserve(&self, unit: &mut QueueUnit, position: Option<usize>, message: Option<&str>) {
        let now = self.now_millis();
        unit.status.last_update_time = Some(now);
        let phase = unit.status.phase;
        if let Some(latest) = unit
            .status
            .conditions
            .last_mut()
            .filter(|c| c.phase == phase)
        {
            latest.last_update_time = now;
        }
        if let Some(rank) = position {
            unit.status.position = rank.to_string();
        }
        if let Some(msg) = message {
            unit.status.message = msg.to_string();
        }
    }

    /// Surface a rejected transition on the unit: phase unchanged, one
    /// condition with status Unknown carrying the error's reason code.
    /// Terminal units are left untouched.
    pub fn record_fault(&self, unit: &mut QueueUnit, error: &DomainError) {
        if unit.status.phase.is_terminal() {
            return;
        }
        let now = self.now_millis();
        let message = error.to_string();
        unit.status.conditions.push(QueueUnitCondition {
            phase: unit.status.phase,
            status: ConditionStatus::Unknown,
            reason: error.reason().to_string(),
            message: message.clone(),
            last_update_time: now,
            last_transition_time: unit.status.phase_since().unwrap_or(now),
        });
        unit.status.message = message;
        unit.status.last_update_time = Some(now);
    }
}
