//! AdmissionController - one admission cycle over every queue
//!
//! Per queue, in this order:
//! 1. apply reported job outcomes
//! 2. engine-driven bind timeouts and backoff retries
//! 3. walk the ordered units and admit what fits
//! 4. derive the queue's `allocated` status
//!
//! A unit is charged when it moves to Dequeued and released exactly once
//! when it leaves the holding phases. Decisions depend only on the store
//! and the snapshot, so the same input produces the same report.

use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::application::backoff::{BackoffDecision, BackoffPolicy};
use crate::application::ledger::Admission;
use crate::application::orderer::PriorityOrderer;
use crate::application::service::panic_guard::{execute_guarded, PanicGuardResult};
use crate::application::service::shutdown::ShutdownToken;
use crate::application::state_machine::{Transition, TransitionOutcome, UnitStateMachine};
use crate::application::store::{QueueEntry, QueueStore};
use crate::config::AdmissionConfig;
use crate::domain::{
    DomainError, Placement, Queue, QueueId, QueueStatus, QueueUnit, QueueUnitPhase, UnitId,
};
use crate::port::{JobObservation, TimeProvider, WorkloadSnapshot};

/// A rejected operation on one unit
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFault {
    pub unit: UnitId,
    pub queue: Option<QueueId>,
    pub error: DomainError,
}

/// Everything one cycle decided
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Admissions in queue order, then rank order
    pub placements: Vec<Placement>,
    /// Units whose status changed
    pub unit_updates: Vec<QueueUnit>,
    /// Derived `allocated` per queue, only where it changed
    pub queue_updates: Vec<(QueueId, QueueStatus)>,
    pub faults: Vec<UnitFault>,
    pub queues_processed: usize,
    /// Queues whose walk panicked; their partial results were discarded
    pub panicked_queues: Vec<QueueId>,
    /// Shutdown was requested before every queue was visited
    pub aborted: bool,
    /// Outcomes for queues that were skipped or panicked, to be reapplied
    /// on the next cycle
    pub unapplied: Vec<JobObservation>,
}

impl CycleReport {
    fn merge(&mut self, queue: QueueReport) {
        self.queues_processed += 1;
        if queue.panicked {
            self.panicked_queues.push(queue.queue);
            return;
        }
        self.placements.extend(queue.placements);
        self.unit_updates.extend(queue.unit_updates);
        self.faults.extend(queue.faults);
        if let Some(status) = queue.status {
            self.queue_updates.push((queue.queue, status));
        }
    }

    pub fn admitted(&self) -> usize {
        self.placements.len()
    }
}

/// Results for one queue, merged into the cycle report in queue order
#[derive(Debug, Default)]
struct QueueReport {
    queue: QueueId,
    placements: Vec<Placement>,
    unit_updates: Vec<QueueUnit>,
    faults: Vec<UnitFault>,
    status: Option<QueueStatus>,
    panicked: bool,
}

/// Per-queue working set: tracks which units changed during the cycle
struct QueueWork<'a> {
    queue: QueueId,
    changed: BTreeSet<UnitId>,
    faults: Vec<UnitFault>,
    placements: Vec<Placement>,
    suspended: &'a BTreeSet<UnitId>,
}

/// What ingesting a control-plane snapshot produced
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Refused units whose status message now names the refusal
    pub refused: Vec<QueueUnit>,
    /// Placements rebuilt for units found already Dequeued
    pub recovered: Vec<Placement>,
}

impl<'a> QueueWork<'a> {
    fn fault(&mut self, unit: &str, error: DomainError) {
        self.faults.push(UnitFault {
            unit: unit.to_string(),
            queue: Some(self.queue.clone()),
            error,
        });
    }
}

pub struct AdmissionController {
    state_machine: UnitStateMachine,
    backoff: BackoffPolicy,
    config: AdmissionConfig,
}

impl AdmissionController {
    pub fn new(time_provider: Arc<dyn TimeProvider>, config: AdmissionConfig) -> Self {
        Self {
            state_machine: UnitStateMachine::new(time_provider.clone()),
            backoff: BackoffPolicy::new(
                time_provider,
                config.bind_timeout_ms,
                config.backoff.clone(),
            ),
            config,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn state_machine(&self) -> &UnitStateMachine {
        &self.state_machine
    }

    /// Ingest a control-plane snapshot into `store`.
    ///
    /// Refused units are returned once their status message names the
    /// refusal; units already carrying that message are not returned again.
    /// Units first seen in Dequeued get their placement rebuilt from the
    /// persisted status.
    pub fn sync(
        &self,
        store: &mut QueueStore,
        queues: Vec<Queue>,
        units: Vec<QueueUnit>,
    ) -> SyncOutcome {
        let report = store.sync(queues, units);
        if !report.dropped_queues.is_empty() {
            info!(queues = ?report.dropped_queues, "Queues dropped from snapshot");
        }

        let recovered = report
            .recovered
            .iter()
            .filter_map(|name| store.unit(name))
            .map(|unit| {
                let rank = unit.status.position.parse::<usize>().unwrap_or_default();
                info!(queue = %unit.spec.queue, unit = %unit.name, rank = rank, "Recovered placement for admitted unit");
                Placement {
                    queue: unit.spec.queue.clone(),
                    unit: unit.name.clone(),
                    rank,
                    consumer_ref: unit.spec.consumer_ref.clone(),
                    suspended: false,
                }
            })
            .collect();

        let refused = report
            .refused
            .into_iter()
            .filter_map(|(mut unit, err)| {
                let message = err.to_string();
                if unit.status.message == message {
                    return None;
                }
                self.state_machine.reobserve(&mut unit, None, Some(&message));
                Some(unit)
            })
            .collect();

        SyncOutcome { refused, recovered }
    }

    /// Run one cycle over every queue in `store`.
    ///
    /// `shutdown` is checked between queues; an aborted cycle still
    /// reports the queues it completed. Outcomes for queues that were not
    /// completed come back in `unapplied`.
    pub fn run_cycle(
        &self,
        store: &mut QueueStore,
        snapshot: &WorkloadSnapshot,
        shutdown: Option<&ShutdownToken>,
    ) -> CycleReport {
        let mut report = CycleReport::default();

        // route outcomes to queues; unknown units become faults
        let mut outcomes: BTreeMap<QueueId, Vec<&JobObservation>> = BTreeMap::new();
        for observation in &snapshot.outcomes {
            match store.unit(&observation.unit) {
                Some(unit) => outcomes
                    .entry(unit.spec.queue.clone())
                    .or_default()
                    .push(observation),
                None => {
                    warn!(unit = %observation.unit, "Outcome reported for unknown unit");
                    report.faults.push(UnitFault {
                        unit: observation.unit.clone(),
                        queue: None,
                        error: DomainError::UnitNotFound(observation.unit.clone()),
                    });
                }
            }
        }

        let is_shutdown = || shutdown.map(|t| t.is_shutdown()).unwrap_or(false);
        let (orderer, entries) = store.entries_for_cycle();
        let total = entries.len();
        let parallel = self.config.max_parallel_queues.max(1);
        let mut completed: BTreeSet<QueueId> = BTreeSet::new();

        if parallel == 1 {
            for entry in entries {
                if is_shutdown() {
                    report.aborted = true;
                    break;
                }
                let pending = outcomes.get(entry.name()).map(Vec::as_slice).unwrap_or(&[]);
                let queue_report = self.guarded_queue(orderer, entry, pending, &snapshot.suspended);
                if !queue_report.panicked {
                    completed.insert(queue_report.queue.clone());
                }
                report.merge(queue_report);
            }
        } else {
            let mut remaining = entries.into_iter();
            loop {
                let batch: Vec<&mut QueueEntry> = remaining.by_ref().take(parallel).collect();
                if batch.is_empty() {
                    break;
                }
                if is_shutdown() {
                    report.aborted = true;
                    break;
                }
                for queue_report in self.parallel_batch(orderer, batch, &outcomes, &snapshot.suspended) {
                    if !queue_report.panicked {
                        completed.insert(queue_report.queue.clone());
                    }
                    report.merge(queue_report);
                }
            }
        }

        report.unapplied = outcomes
            .into_iter()
            .filter(|(queue, _)| !completed.contains(queue))
            .flat_map(|(_, observations)| observations.into_iter().cloned())
            .collect();
        if !report.unapplied.is_empty() {
            warn!(outcomes = report.unapplied.len(), "Outcomes deferred to the next cycle");
        }

        if report.aborted {
            warn!(
                processed = report.queues_processed,
                total = total,
                "Admission cycle aborted by shutdown"
            );
        }
        report
    }

    /// Walk a batch of queues on scoped threads, results in batch order
    fn parallel_batch(
        &self,
        orderer: &PriorityOrderer,
        batch: Vec<&mut QueueEntry>,
        outcomes: &BTreeMap<QueueId, Vec<&JobObservation>>,
        suspended: &BTreeSet<UnitId>,
    ) -> Vec<QueueReport> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .into_iter()
                .map(|entry| {
                    let name = entry.name().to_string();
                    let pending = outcomes.get(&name).map(Vec::as_slice).unwrap_or(&[]);
                    let handle =
                        scope.spawn(move || self.guarded_queue(orderer, entry, pending, suspended));
                    (name, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(name, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        error!(queue = %name, "Queue worker thread died");
                        QueueReport {
                            queue: name,
                            panicked: true,
                            ..Default::default()
                        }
                    })
                })
                .collect()
        })
    }

    /// Process one queue inside a panic guard. On panic the queue is put
    /// back exactly as it was before the cycle touched it.
    fn guarded_queue(
        &self,
        orderer: &PriorityOrderer,
        entry: &mut QueueEntry,
        outcomes: &[&JobObservation],
        suspended: &BTreeSet<UnitId>,
    ) -> QueueReport {
        let name = entry.name().to_string();
        let checkpoint = entry.clone();
        let result = execute_guarded(
            &name,
            AssertUnwindSafe(|| self.process_queue(orderer, &mut *entry, outcomes, suspended)),
        );
        match result {
            PanicGuardResult::Success(report) => report,
            PanicGuardResult::Panicked(msg) => {
                error!(queue = %name, panic_msg = %msg, "Queue walk panicked, state restored");
                *entry = checkpoint;
                QueueReport {
                    queue: name,
                    panicked: true,
                    ..Default::default()
                }
            }
        }
    }

    fn process_queue(
        &self,
        orderer: &PriorityOrderer,
        entry: &mut QueueEntry,
        outcomes: &[&JobObservation],
        suspended: &BTreeSet<UnitId>,
    ) -> QueueReport {
        let mut work = QueueWork {
            queue: entry.name().to_string(),
            changed: BTreeSet::new(),
            faults: Vec::new(),
            placements: Vec::new(),
            suspended,
        };

        for observation in outcomes {
            self.apply_outcome(entry, observation, &mut work);
        }
        self.apply_timers(entry, &mut work);
        self.walk(orderer, entry, &mut work);

        let unit_updates = work
            .changed
            .iter()
            .filter_map(|name| entry.unit(name).cloned())
            .collect();
        let status = entry.refresh_status();

        QueueReport {
            queue: work.queue,
            placements: work.placements,
            unit_updates,
            faults: work.faults,
            status,
            panicked: false,
        }
    }

    fn apply_outcome(&self, entry: &mut QueueEntry, observation: &JobObservation, work: &mut QueueWork<'_>) {
        let (target, reason) = observation.outcome.transition();
        let message = observation.outcome.message();
        self.transition(entry, &observation.unit, Transition::new(target, reason, &message), work);
    }

    /// Bind timeouts for Dequeued units, retry release for Backoff units
    fn apply_timers(&self, entry: &mut QueueEntry, work: &mut QueueWork<'_>) {
        let due: Vec<(UnitId, BackoffDecision)> = entry
            .units()
            .map(|unit| (unit.name.clone(), self.backoff.evaluate(unit)))
            .filter(|(_, decision)| *decision != BackoffDecision::Wait)
            .collect();

        for (name, decision) in due {
            match decision {
                BackoffDecision::BindTimedOut { waited_ms } => {
                    let message = format!("not bound within {}ms", waited_ms);
                    self.transition(
                        entry,
                        &name,
                        Transition::new(QueueUnitPhase::Backoff, "BindTimeout", &message),
                        work,
                    );
                }
                BackoffDecision::RetryDue { delay_ms } => {
                    let message = format!("released after {}ms backoff", delay_ms);
                    self.transition(
                        entry,
                        &name,
                        Transition::new(QueueUnitPhase::Enqueued, "RetryReleased", &message),
                        work,
                    );
                }
                BackoffDecision::Wait => {}
            }
        }
    }

    /// Apply a transition to a unit of `entry`, releasing resources when it
    /// leaves the holding phases
    fn transition(
        &self,
        entry: &mut QueueEntry,
        unit_name: &str,
        transition: Transition<'_>,
        work: &mut QueueWork<'_>,
    ) {
        let Some((unit, ledger)) = entry.unit_and_ledger_mut(unit_name) else {
            work.fault(unit_name, DomainError::UnitNotFound(unit_name.to_string()));
            return;
        };

        match self.state_machine.apply_transition(unit, transition) {
            Ok(TransitionOutcome::Transitioned { from, to }) => {
                if !to.holds_resources() {
                    if let Some(released) = ledger.release(unit_name) {
                        debug!(unit = %unit_name, from = %from, to = %to, released = ?released, "Resources released");
                    }
                }
                work.changed.insert(unit_name.to_string());
            }
            Ok(TransitionOutcome::Reobserved) => {
                work.changed.insert(unit_name.to_string());
            }
            Err(e @ DomainError::AlreadyTerminal { .. }) => {
                warn!(unit = %unit_name, error = %e, "Transition on terminal unit ignored");
                work.fault(unit_name, e);
            }
            Err(e) => {
                warn!(unit = %unit_name, error = %e, "Transition rejected");
                self.state_machine.record_fault(unit, &e);
                work.changed.insert(unit_name.to_string());
                work.fault(unit_name, e);
            }
        }
    }

    /// Walk units front-to-back and admit what fits
    fn walk(&self, orderer: &PriorityOrderer, entry: &mut QueueEntry, work: &mut QueueWork<'_>) {
        let candidates: Vec<UnitId> = entry
            .ordered(orderer)
            .filter(|u| u.phase() == QueueUnitPhase::Enqueued)
            .map(|u| u.name.clone())
            .collect();

        let queue_name = work.queue.clone();
        let mut blocked = false;

        for (index, name) in candidates.iter().enumerate() {
            let rank = index + 1;
            let Some((unit, ledger)) = entry.unit_and_ledger_mut(name) else {
                continue;
            };

            if blocked {
                if unit.status.position != rank.to_string() {
                    self.state_machine.reobserve(unit, Some(rank), None);
                    work.changed.insert(name.clone());
                }
                continue;
            }

            match ledger.try_admit(name, &unit.spec.resource) {
                Admission::Granted | Admission::AlreadyHeld => {
                    let message = format!("admitted to queue {} at rank {}", queue_name, rank);
                    let transition =
                        Transition::new(QueueUnitPhase::Dequeued, "Admitted", &message).at_position(rank);
                    match self.state_machine.apply_transition(unit, transition) {
                        Ok(_) => {
                            let suspended = work.suspended.contains(name);
                            info!(
                                queue = %queue_name,
                                unit = %name,
                                rank = rank,
                                suspended = suspended,
                                "Unit admitted"
                            );
                            work.placements.push(Placement {
                                queue: queue_name.clone(),
                                unit: name.clone(),
                                rank,
                                consumer_ref: unit.spec.consumer_ref.clone(),
                                suspended,
                            });
                        }
                        Err(e) => {
                            ledger.release(name);
                            warn!(unit = %name, error = %e, "Admission transition rejected");
                            self.state_machine.record_fault(unit, &e);
                            work.fault(name, e);
                        }
                    }
                    work.changed.insert(name.clone());
                }
                Admission::Denied(denial) => {
                    let message = denial.to_string();
                    debug!(queue = %queue_name, unit = %name, rank = rank, %denial, "Unit not admitted");
                    if unit.status.position != rank.to_string() || unit.status.message != message {
                        self.state_machine.reobserve(unit, Some(rank), Some(&message));
                        work.changed.insert(name.clone());
                    }
                    if self.config.strict_head_of_line {
                        blocked = true;
                    }
                }
            }
        }
    }
}
