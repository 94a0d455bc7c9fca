// Admission Service - cycle loop around the AdmissionController

pub mod constants;
pub mod panic_guard;
pub mod shutdown;

use constants::*;
pub use panic_guard::{execute_guarded, PanicGuardResult};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::application::admission::{AdmissionController, CycleReport};
use crate::application::orderer::PriorityOrderer;
use crate::application::store::QueueStore;
use crate::config::AdmissionConfig;
use crate::domain::{Placement, QueueId, QueueUnit, QueueUnitPhase, UnitId};
use crate::error::{AppError, Result};
use crate::port::{
    ControlPlane, IdProvider, JobObservation, PlacementSink, TimeProvider, WorkloadSource,
};

/// Result of `AdmissionService::run_cycle`
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle held the lock
    Skipped,
}

/// State guarded by the cycle lock
struct ServiceState {
    store: QueueStore,
    /// Placements for suspended work, keyed by unit
    held: BTreeMap<UnitId, Placement>,
    /// Status writes that failed and are retried next cycle
    unwritten_units: BTreeSet<UnitId>,
    unwritten_queues: BTreeSet<QueueId>,
    /// Outcomes polled but not applied, replayed ahead of the next poll
    deferred: Vec<JobObservation>,
}

/// Pulls snapshots, runs admission cycles and pushes decisions back
pub struct AdmissionService {
    control_plane: Arc<dyn ControlPlane>,
    workloads: Arc<dyn WorkloadSource>,
    placements: Arc<dyn PlacementSink>,
    id_provider: Arc<dyn IdProvider>,
    controller: AdmissionController,
    state: Mutex<ServiceState>,
    interval: Duration,
}

impl AdmissionService {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        workloads: Arc<dyn WorkloadSource>,
        placements: Arc<dyn PlacementSink>,
        orderer: PriorityOrderer,
        time_provider: Arc<dyn TimeProvider>,
        id_provider: Arc<dyn IdProvider>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            control_plane,
            workloads,
            placements,
            id_provider,
            controller: AdmissionController::new(time_provider, config),
            state: Mutex::new(ServiceState {
                store: QueueStore::new(orderer),
                held: BTreeMap::new(),
                unwritten_units: BTreeSet::new(),
                unwritten_queues: BTreeSet::new(),
                deferred: Vec::new(),
            }),
            interval: DEFAULT_CYCLE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run cycles until shutdown
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(interval_ms = %self.interval.as_millis(), "Admission service started");
        loop {
            if shutdown.is_shutdown() {
                info!("Admission service shutting down");
                break;
            }

            let pause = match self.run_cycle(Some(&shutdown)).await {
                Ok(_) => self.interval,
                Err(e) => {
                    error!(error = %e, "Admission cycle failed");
                    ERROR_RECOVERY_SLEEP_DURATION
                }
            };

            tokio::select! {
                _ = sleep(pause) => {},
                _ = shutdown.wait() => {
                    info!("Admission service interrupted while idle");
                    break;
                }
            }
        }
        info!("Admission service stopped");
        Ok(())
    }

    /// Run one cycle unless another one is in progress
    ///
    /// # Errors
    /// Snapshot pulls that fail abort the cycle before any decision is made.
    /// Write-back failures are logged and retried on the next cycle.
    pub async fn run_cycle(&self, shutdown: Option<&ShutdownToken>) -> Result<CycleOutcome> {
        let mut state = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Admission cycle already running, skipped");
                return Ok(CycleOutcome::Skipped);
            }
        };

        let cycle_id = self.id_provider.generate_id();
        let span = info_span!("admission_cycle", cycle_id = %cycle_id);
        async move {
            let started = Instant::now();

            let queues = self.control_plane.list_queues().await?;
            let units = self.control_plane.list_units().await?;
            let mut workload = self.workloads.poll().await?;

            let state = &mut *state;
            if !state.deferred.is_empty() {
                let mut outcomes = std::mem::take(&mut state.deferred);
                outcomes.append(&mut workload.outcomes);
                workload.outcomes = outcomes;
            }

            let synced = self.controller.sync(&mut state.store, queues, units);
            for placement in synced.recovered {
                state.held.entry(placement.unit.clone()).or_insert(placement);
            }
            let mut report = self
                .controller
                .run_cycle(&mut state.store, &workload, shutdown);
            state.deferred = report.unapplied.clone();
            if !synced.refused.is_empty() {
                let mut updates = synced.refused;
                updates.append(&mut report.unit_updates);
                report.unit_updates = updates;
            }

            self.dispatch(state, &report, &workload.suspended).await;
            self.write_back(state, &report).await;

            info!(
                queues = report.queues_processed,
                admitted = report.admitted(),
                updates = report.unit_updates.len(),
                faults = report.faults.len(),
                held = state.held.len(),
                deferred = state.deferred.len(),
                aborted = report.aborted,
                duration_ms = %started.elapsed().as_millis(),
                "Admission cycle completed"
            );
            Ok::<_, AppError>(CycleOutcome::Completed(report))
        }
        .instrument(span)
        .await
    }

    /// Send placements to the actuator. Suspended work is held until its
    /// flag clears; held placements of units that left Dequeued are dropped.
    async fn dispatch(
        &self,
        state: &mut ServiceState,
        report: &CycleReport,
        suspended: &BTreeSet<UnitId>,
    ) {
        for placement in &report.placements {
            state.held.insert(placement.unit.clone(), placement.clone());
        }

        let held: Vec<UnitId> = state.held.keys().cloned().collect();
        for unit in held {
            let still_dequeued = state
                .store
                .unit(&unit)
                .map(|u| u.phase() == QueueUnitPhase::Dequeued)
                .unwrap_or(false);
            if !still_dequeued {
                debug!(unit = %unit, "Dropping held placement, unit left Dequeued");
                state.held.remove(&unit);
                continue;
            }
            if suspended.contains(&unit) {
                continue;
            }

            let Some(mut placement) = state.held.remove(&unit) else {
                continue;
            };
            placement.suspended = false;
            if let Err(e) = self.placements.place(&placement).await {
                warn!(unit = %unit, queue = %placement.queue, error = %e, "Placement failed, will retry");
                state.held.insert(unit, placement);
            }
        }
    }

    /// Push changed statuses, plus anything that failed to write last time
    async fn write_back(&self, state: &mut ServiceState, report: &CycleReport) {
        let mut units: Vec<QueueUnit> = report.unit_updates.clone();
        let reported: BTreeSet<&str> = report.unit_updates.iter().map(|u| u.name.as_str()).collect();
        for name in &state.unwritten_units {
            if !reported.contains(name.as_str()) {
                if let Some(unit) = state.store.unit(name) {
                    units.push(unit.clone());
                }
            }
        }
        state.unwritten_units.clear();

        for unit in &units {
            if let Err(e) = self
                .control_plane
                .update_unit_status(&unit.name, &unit.status)
                .await
            {
                warn!(unit = %unit.name, error = %e, "Unit status write failed");
                state.unwritten_units.insert(unit.name.clone());
            }
        }

        let mut queues: BTreeMap<QueueId, _> = report.queue_updates.iter().cloned().collect();
        for name in std::mem::take(&mut state.unwritten_queues) {
            if let Ok(entry) = state.store.entry(&name) {
                queues.entry(name).or_insert_with(|| entry.status());
            }
        }
        for (name, status) in queues {
            if let Err(e) = self.control_plane.update_queue_status(&name, &status).await {
                warn!(queue = %name, error = %e, "Queue status write failed");
                state.unwritten_queues.insert(name);
            }
        }
    }

    /// Snapshot of a unit as the engine sees it
    pub async fn unit(&self, name: &str) -> Option<QueueUnit> {
        self.state.lock().await.store.unit(name).cloned()
    }

    /// Units with a placement waiting for their suspend flag to clear
    pub async fn held_placements(&self) -> Vec<UnitId> {
        self.state.lock().await.held.keys().cloned().collect()
    }
}
