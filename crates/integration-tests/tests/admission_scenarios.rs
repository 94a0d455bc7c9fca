//! Admission scenarios across the store, ledger, state machine and controller

use std::sync::Arc;

use admit_core::application::state_machine::Transition;
use admit_core::application::{AdmissionController, PriorityOrderer, QueueStore};
use admit_core::domain::{
    resources, DomainError, Queue, QueuePolicy, QueueUnit, QueueUnitPhase,
};
use admit_core::port::{JobObservation, JobOutcome, ManualTimeProvider, WorkloadSnapshot};
use admit_core::AdmissionConfig;
use admit_infra_memory::StaticPriorityClassResolver;

fn controller() -> (AdmissionController, Arc<ManualTimeProvider>) {
    let clock = Arc::new(ManualTimeProvider::new(1_000));
    (
        AdmissionController::new(clock.clone(), AdmissionConfig::default()),
        clock,
    )
}

fn idle() -> WorkloadSnapshot {
    WorkloadSnapshot::default()
}

/// Priority queue q1 (cpu 4): u1 (p10, cpu 3) and u2 (p5, cpu 3)
#[test]
fn test_priority_queue_admits_in_turn() {
    let (ctl, _) = controller();
    let mut store = QueueStore::new(PriorityOrderer::default());
    store.upsert_queue(Queue::new(
        "q1",
        QueuePolicy::Priority,
        resources(&[("cpu", "4")]).unwrap(),
    ));
    store
        .enqueue(QueueUnit::new("u1", 200, "q1", resources(&[("cpu", "3")]).unwrap()).with_priority(10))
        .unwrap();
    store
        .enqueue(QueueUnit::new("u2", 100, "q1", resources(&[("cpu", "3")]).unwrap()).with_priority(5))
        .unwrap();

    // cycle 1: u1 admitted, u2 denied at position 2
    let report = ctl.run_cycle(&mut store, &idle(), None);
    assert_eq!(report.admitted(), 1);
    assert_eq!(report.placements[0].unit, "u1");
    let u1 = store.unit("u1").unwrap();
    assert_eq!(u1.phase(), QueueUnitPhase::Dequeued);
    assert_eq!(u1.status.position, "1");
    let u2 = store.unit("u2").unwrap();
    assert_eq!(u2.phase(), QueueUnitPhase::Enqueued);
    assert_eq!(u2.status.position, "2");
    assert_eq!(
        store.entry("q1").unwrap().ledger().allocated().amount("cpu").milli(),
        3000
    );

    // u1 runs and fails
    let outcomes = WorkloadSnapshot {
        outcomes: vec![
            JobObservation::new("u1", JobOutcome::Bound),
            JobObservation::new("u1", JobOutcome::Failed("exit code 1".to_string())),
        ],
        ..Default::default()
    };

    // cycle 2: u1 released, u2 admitted
    let report = ctl.run_cycle(&mut store, &outcomes, None);
    assert_eq!(store.unit("u1").unwrap().phase(), QueueUnitPhase::Failed);
    assert_eq!(report.admitted(), 1);
    assert_eq!(report.placements[0].unit, "u2");
    assert_eq!(store.unit("u2").unwrap().phase(), QueueUnitPhase::Dequeued);
    assert_eq!(
        store.entry("q1").unwrap().ledger().allocated().amount("cpu").milli(),
        3000
    );
}

/// A resource kind missing from the capability is unbounded
#[test]
fn test_undeclared_resource_is_unbounded() {
    let (ctl, _) = controller();
    let mut store = QueueStore::new(PriorityOrderer::default());
    store.upsert_queue(Queue::new(
        "q1",
        QueuePolicy::Fifo,
        resources(&[("cpu", "4")]).unwrap(),
    ));
    for i in 0..20 {
        store
            .enqueue(QueueUnit::new(
                format!("u{}", i),
                i,
                "q1",
                resources(&[("memory", "64Gi")]).unwrap(),
            ))
            .unwrap();
    }

    let report = ctl.run_cycle(&mut store, &idle(), None);
    assert_eq!(report.admitted(), 20);
    let ledger = store.entry("q1").unwrap().ledger();
    assert_eq!(ledger.allocated().amount("cpu").milli(), 0);
    assert!(ledger.allocated().fits_within(ledger.capability()));
}

/// A terminal unit rejects further transitions and its log is unchanged
#[test]
fn test_terminal_unit_rejects_transition() {
    let (ctl, _) = controller();
    let sm = ctl.state_machine();
    let mut unit = QueueUnit::new("u1", 1, "q1", resources(&[("cpu", "1")]).unwrap());
    for (phase, reason) in [
        (QueueUnitPhase::Dequeued, "Admitted"),
        (QueueUnitPhase::Running, "Bound"),
        (QueueUnitPhase::Succeed, "JobSucceeded"),
    ] {
        sm.apply_transition(&mut unit, Transition::new(phase, reason, ""))
            .unwrap();
    }
    let conditions = unit.status.conditions.clone();

    let err = sm
        .apply_transition(&mut unit, Transition::new(QueueUnitPhase::Running, "Bound", ""))
        .unwrap_err();
    assert!(matches!(err, DomainError::AlreadyTerminal { .. }));
    assert_eq!(unit.status.conditions, conditions);
}

/// Re-observing the current phase only refreshes timestamps
#[test]
fn test_reobservation_keeps_condition_log() {
    let (ctl, clock) = controller();
    let sm = ctl.state_machine();
    let mut unit = QueueUnit::new("u1", 1, "q1", resources(&[("cpu", "1")]).unwrap());
    sm.apply_transition(&mut unit, Transition::new(QueueUnitPhase::Dequeued, "Admitted", ""))
        .unwrap();
    let before = unit.status.conditions.len();

    clock.advance(250);
    sm.apply_transition(&mut unit, Transition::new(QueueUnitPhase::Dequeued, "Admitted", ""))
        .unwrap();
    assert_eq!(unit.status.conditions.len(), before);
    assert_eq!(unit.status.last_update_time, Some(1_250));
}

/// Shrinking capability never evicts; new admissions wait for the drain
#[test]
fn test_capability_shrink_while_in_flight() {
    let (ctl, _) = controller();
    let mut store = QueueStore::new(PriorityOrderer::default());
    store.upsert_queue(Queue::new(
        "q1",
        QueuePolicy::Fifo,
        resources(&[("cpu", "4")]).unwrap(),
    ));
    store
        .enqueue(QueueUnit::new("a", 1, "q1", resources(&[("cpu", "3")]).unwrap()))
        .unwrap();
    ctl.run_cycle(&mut store, &idle(), None);

    store
        .update_capability("q1", resources(&[("cpu", "2")]).unwrap())
        .unwrap();
    store
        .enqueue(QueueUnit::new("b", 2, "q1", resources(&[("cpu", "1")]).unwrap()))
        .unwrap();
    let report = ctl.run_cycle(&mut store, &idle(), None);
    assert_eq!(report.admitted(), 0);
    assert_eq!(store.unit("a").unwrap().phase(), QueueUnitPhase::Dequeued);

    let done = WorkloadSnapshot {
        outcomes: vec![
            JobObservation::new("a", JobOutcome::Bound),
            JobObservation::new("a", JobOutcome::Succeeded),
        ],
        ..Default::default()
    };
    let report = ctl.run_cycle(&mut store, &done, None);
    assert_eq!(report.placements[0].unit, "b");
}

/// Units of an unknown queue are refused until the queue appears
#[test]
fn test_missing_queue_fails_closed() {
    let (ctl, _) = controller();
    let mut store = QueueStore::new(PriorityOrderer::default());
    let unit = QueueUnit::new("u1", 1, "late", resources(&[("cpu", "1")]).unwrap());

    let refused = ctl.sync(&mut store, vec![], vec![unit.clone()]).refused;
    assert_eq!(refused.len(), 1);
    assert_eq!(ctl.run_cycle(&mut store, &idle(), None).admitted(), 0);

    let queue = Queue::new("late", QueuePolicy::Fifo, resources(&[("cpu", "1")]).unwrap());
    let refused = ctl.sync(&mut store, vec![queue], vec![unit]).refused;
    assert!(refused.is_empty());
    assert_eq!(ctl.run_cycle(&mut store, &idle(), None).admitted(), 1);
}

/// Units found in a holding phase at ingest are charged to the ledger
#[test]
fn test_restart_restores_allocation() {
    let (ctl, _) = controller();
    let mut store = QueueStore::new(PriorityOrderer::default());
    let queue = Queue::new("q1", QueuePolicy::Fifo, resources(&[("cpu", "4")]).unwrap());
    let mut running = QueueUnit::new("running", 1, "q1", resources(&[("cpu", "3")]).unwrap());
    running.status.phase = QueueUnitPhase::Running;
    let pending = QueueUnit::new("pending", 2, "q1", resources(&[("cpu", "2")]).unwrap());

    ctl.sync(&mut store, vec![queue], vec![running, pending]);
    let report = ctl.run_cycle(&mut store, &idle(), None);
    assert_eq!(report.admitted(), 0);
    assert_eq!(
        store.entry("q1").unwrap().ledger().allocated().amount("cpu").milli(),
        3000
    );
}

/// Priority classes resolve through the configured resolver
#[test]
fn test_priority_class_ordering() {
    let (ctl, _) = controller();
    let resolver = StaticPriorityClassResolver::default()
        .with("critical", 1000)
        .with("batch", 1);
    let mut store = QueueStore::new(PriorityOrderer::new(Arc::new(resolver)));
    store.upsert_queue(Queue::new(
        "q1",
        QueuePolicy::Priority,
        resources(&[("cpu", "1")]).unwrap(),
    ));
    store
        .enqueue(
            QueueUnit::new("batch-job", 1, "q1", resources(&[("cpu", "1")]).unwrap())
                .with_priority_class("batch"),
        )
        .unwrap();
    store
        .enqueue(
            QueueUnit::new("critical-job", 2, "q1", resources(&[("cpu", "1")]).unwrap())
                .with_priority_class("critical"),
        )
        .unwrap();

    let report = ctl.run_cycle(&mut store, &idle(), None);
    assert_eq!(report.placements[0].unit, "critical-job");
    assert_eq!(store.unit("batch-job").unwrap().status.position, "2");
}

/// Withdrawn units release what they hold
#[test]
fn test_withdrawal_releases_capacity() {
    let (ctl, _) = controller();
    let mut store = QueueStore::new(PriorityOrderer::default());
    let queue = Queue::new("q1", QueuePolicy::Fifo, resources(&[("cpu", "2")]).unwrap());
    let a = QueueUnit::new("a", 1, "q1", resources(&[("cpu", "2")]).unwrap());
    let b = QueueUnit::new("b", 2, "q1", resources(&[("cpu", "2")]).unwrap());

    ctl.sync(&mut store, vec![queue.clone()], vec![a, b.clone()]);
    let report = ctl.run_cycle(&mut store, &idle(), None);
    assert_eq!(report.placements[0].unit, "a");

    ctl.sync(&mut store, vec![queue], vec![b]);
    let report = ctl.run_cycle(&mut store, &idle(), None);
    assert_eq!(report.placements[0].unit, "b");
}
