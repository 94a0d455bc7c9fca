//! Property checks driven by seeded random generators

use std::cmp::Ordering;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use admit_core::application::{Admission, AdmissionController, CapacityLedger, PriorityOrderer, QueueStore};
use admit_core::domain::{
    Quantity, Queue, QueuePolicy, QueueUnit, QueueUnitPhase, ResourceList,
};
use admit_core::port::{JobObservation, JobOutcome, ManualTimeProvider, WorkloadSnapshot};
use admit_core::AdmissionConfig;

const SEEDS: [u64; 5] = [1, 7, 42, 1337, 9001];

fn cpu_milli(milli: i64) -> ResourceList {
    ResourceList::new().with("cpu", Quantity::from_milli(milli).unwrap())
}

fn random_request(rng: &mut StdRng) -> ResourceList {
    let mut request = cpu_milli(rng.gen_range(1..=2_000));
    if rng.gen_bool(0.5) {
        request.insert("memory", Quantity::from_units(rng.gen_range(1..=8)).unwrap());
    }
    request
}

fn random_unit(rng: &mut StdRng, index: usize, queue: &str) -> QueueUnit {
    // narrow ranges force ties on priority and creation time
    let mut unit = QueueUnit::new(
        format!("{}-unit-{}", queue, index),
        rng.gen_range(0..10),
        queue,
        random_request(rng),
    );
    if rng.gen_bool(0.7) {
        unit = unit.with_priority(rng.gen_range(-2..=2));
    }
    unit
}

#[test]
fn test_compare_is_strict_total_order() {
    let orderer = PriorityOrderer::default();
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let units: Vec<QueueUnit> = (0..30).map(|i| random_unit(&mut rng, i, "q")).collect();

        for policy in [QueuePolicy::Fifo, QueuePolicy::Priority] {
            for a in &units {
                assert_eq!(orderer.compare(policy, a, a), Ordering::Equal);
                for b in &units {
                    let ab = orderer.compare(policy, a, b);
                    assert_eq!(ab, orderer.compare(policy, b, a).reverse());
                    if a.name != b.name {
                        assert_ne!(ab, Ordering::Equal, "{} vs {}", a.name, b.name);
                    }
                    for c in &units {
                        if ab == Ordering::Less && orderer.compare(policy, b, c) == Ordering::Less {
                            assert_eq!(orderer.compare(policy, a, c), Ordering::Less);
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_admit_then_release_restores_allocation() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let capability = cpu_milli(rng.gen_range(2_000..=8_000));
        let mut ledger = CapacityLedger::new(capability);

        for i in 0..50 {
            let before = ledger.allocated().clone();
            let name = format!("candidate-{}", i);
            let request = random_request(&mut rng);

            match ledger.try_admit(&name, &request) {
                Admission::Granted => {
                    assert_eq!(ledger.release(&name), Some(request.clone()));
                    let mut after = ledger.allocated().clone();
                    after.prune_zero();
                    let mut expected = before.clone();
                    expected.prune_zero();
                    assert_eq!(after, expected);
                }
                Admission::Denied(_) => assert_eq!(ledger.allocated(), &before),
                Admission::AlreadyHeld => unreachable!("candidate names are unique"),
            }

            // keep some load so later candidates see a non-empty ledger
            if rng.gen_bool(0.5) {
                ledger.try_admit(&format!("resident-{}", i), &random_request(&mut rng));
            }
        }
    }
}

/// Random outcomes for units the engine has admitted
fn random_outcomes(rng: &mut StdRng, store: &QueueStore, names: &[String]) -> WorkloadSnapshot {
    let mut outcomes = Vec::new();
    for name in names {
        let Some(unit) = store.unit(name) else { continue };
        let outcome = match unit.phase() {
            QueueUnitPhase::Dequeued if rng.gen_bool(0.6) => Some(JobOutcome::Bound),
            QueueUnitPhase::Dequeued if rng.gen_bool(0.2) => Some(JobOutcome::TimedOut),
            QueueUnitPhase::Running => match rng.gen_range(0..6) {
                0 => Some(JobOutcome::Succeeded),
                1 => Some(JobOutcome::Failed("crashed".to_string())),
                2 => Some(JobOutcome::TimedOut),
                3 => Some(JobOutcome::ConsumerNotFound),
                _ => None,
            },
            QueueUnitPhase::Backoff if rng.gen_bool(0.5) => Some(JobOutcome::RetryReleased),
            // occasionally report something illegal
            QueueUnitPhase::Enqueued if rng.gen_bool(0.05) => Some(JobOutcome::Succeeded),
            _ => None,
        };
        if let Some(outcome) = outcome {
            outcomes.push(JobObservation::new(name.clone(), outcome));
        }
    }
    WorkloadSnapshot {
        outcomes,
        ..Default::default()
    }
}

fn build_store(seed: u64) -> (QueueStore, Vec<String>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut store = QueueStore::new(PriorityOrderer::default());
    let mut names = Vec::new();
    for (q, policy) in [("alpha", QueuePolicy::Priority), ("beta", QueuePolicy::Fifo)] {
        let capability = cpu_milli(rng.gen_range(1_000..=6_000))
            .with("memory", Quantity::from_units(rng.gen_range(4..=16)).unwrap());
        store.upsert_queue(Queue::new(q, policy, capability));
        for i in 0..25 {
            let unit = random_unit(&mut rng, i, q);
            names.push(unit.name.clone());
            store.enqueue(unit).unwrap();
        }
    }
    (store, names)
}

#[test]
fn test_allocated_stays_within_capability() {
    for seed in SEEDS {
        let clock = Arc::new(ManualTimeProvider::new(0));
        let ctl = AdmissionController::new(clock.clone(), AdmissionConfig::default());
        let (mut store, names) = build_store(seed);
        let mut rng = StdRng::seed_from_u64(seed ^ 0xA5A5);

        for _ in 0..40 {
            let snapshot = random_outcomes(&mut rng, &store, &names);
            ctl.run_cycle(&mut store, &snapshot, None);
            clock.advance(rng.gen_range(0..5_000));

            for queue in ["alpha", "beta"] {
                let entry = store.entry(queue).unwrap();
                let ledger = entry.ledger();
                assert!(
                    ledger.allocated().fits_within(ledger.capability()),
                    "seed {}: {} over capability: {:?}",
                    seed,
                    queue,
                    ledger.allocated()
                );

                // allocated equals the sum of what holding units requested
                let mut expected = ResourceList::new();
                for unit in entry.units().filter(|u| u.phase().holds_resources()) {
                    expected.add(&unit.spec.resource);
                    assert!(ledger.holds(&unit.name));
                }
                expected.prune_zero();
                let mut actual = ledger.allocated().clone();
                actual.prune_zero();
                assert_eq!(actual, expected);
            }
        }
    }
}

#[test]
fn test_same_input_same_decisions() {
    for seed in SEEDS {
        let run = || {
            let clock = Arc::new(ManualTimeProvider::new(0));
            let ctl = AdmissionController::new(clock.clone(), AdmissionConfig::default());
            let (mut store, names) = build_store(seed);
            let mut rng = StdRng::seed_from_u64(seed);
            let mut history = Vec::new();
            for _ in 0..10 {
                let snapshot = random_outcomes(&mut rng, &store, &names);
                let report = ctl.run_cycle(&mut store, &snapshot, None);
                history.push((report.placements, report.unit_updates));
                clock.advance(1_000);
            }
            history
        };
        assert_eq!(run(), run());
    }
}
