//! QueueStore - in-memory index of queues and their units
//!
//! Each queue keeps its units, its capacity ledger and an ordered index.
//! Mutations only mark the index dirty; it is re-sorted on the next peek,
//! so a burst of enqueues costs one sort per cycle.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::application::ledger::CapacityLedger;
use crate::application::orderer::PriorityOrderer;
use crate::domain::error::{DomainError, Result};
use crate::domain::{
    Queue, QueueId, QueuePolicy, QueueStatus, QueueUnit, QueueUnitPhase, ResourceList, UnitId,
};

/// One queue with its units, ledger and ordered index
#[derive(Debug, Clone)]
pub struct QueueEntry {
    queue: Queue,
    ledger: CapacityLedger,
    units: BTreeMap<UnitId, QueueUnit>,
    order: Vec<UnitId>,
    dirty: bool,
}

impl QueueEntry {
    fn new(queue: Queue) -> Self {
        let ledger = CapacityLedger::new(queue.spec.capability.clone());
        Self {
            queue,
            ledger,
            units: BTreeMap::new(),
            order: Vec::new(),
            dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.queue.name
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn policy(&self) -> QueuePolicy {
        self.queue.spec.policy
    }

    pub fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    pub fn unit(&self, name: &str) -> Option<&QueueUnit> {
        self.units.get(name)
    }

    /// Mutable access for phase/status changes. Ordering keys live in the
    /// spec, which only `QueueStore::enqueue` replaces.
    pub fn unit_mut(&mut self, name: &str) -> Option<&mut QueueUnit> {
        self.units.get_mut(name)
    }

    /// Mutable access to a unit together with the ledger
    pub fn unit_and_ledger_mut(
        &mut self,
        name: &str,
    ) -> Option<(&mut QueueUnit, &mut CapacityLedger)> {
        let unit = self.units.get_mut(name)?;
        Some((unit, &mut self.ledger))
    }

    pub fn units(&self) -> impl Iterator<Item = &QueueUnit> {
        self.units.values()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Derived queue status
    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            allocated: self.ledger.allocated().clone(),
        }
    }

    /// Sync the queue's status with the ledger. Returns the new status if it changed.
    pub fn refresh_status(&mut self) -> Option<QueueStatus> {
        let status = self.status();
        if status == self.queue.status {
            return None;
        }
        self.queue.status = status.clone();
        Some(status)
    }

    fn reindex(&mut self, orderer: &PriorityOrderer) {
        if !self.dirty {
            return;
        }
        let policy = self.queue.spec.policy;
        let mut ordered: Vec<&QueueUnit> = self.units.values().collect();
        orderer.sort(policy, &mut ordered);
        self.order = ordered.into_iter().map(|u| u.name.clone()).collect();
        self.dirty = false;
        debug!(queue = %self.queue.name, units = self.order.len(), "Queue re-indexed");
    }

    /// Units in scheduling order. Re-sorts first if membership changed.
    pub fn ordered(&mut self, orderer: &PriorityOrderer) -> OrderedUnits<'_> {
        self.reindex(orderer);
        OrderedUnits {
            entry: self,
            pos: 0,
        }
    }

    fn apply_policy(&mut self, policy: QueuePolicy) {
        if self.queue.spec.policy != policy {
            info!(queue = %self.queue.name, from = %self.queue.spec.policy, to = %policy, "Queue policy changed");
            self.queue.spec.policy = policy;
            self.dirty = true;
        }
    }

    fn apply_capability(&mut self, capability: ResourceList) {
        if self.queue.spec.capability != capability {
            info!(queue = %self.queue.name, capability = ?capability, "Queue capability changed");
            self.queue.spec.capability = capability.clone();
            self.ledger.set_capability(capability);
        }
    }

    fn insert(&mut self, unit: QueueUnit) {
        if unit.phase().holds_resources() {
            self.ledger.restore(&unit.name, &unit.spec.resource);
        }
        self.units.insert(unit.name.clone(), unit);
        self.dirty = true;
    }

    fn take(&mut self, name: &str) -> Option<QueueUnit> {
        let unit = self.units.remove(name)?;
        if let Some(held) = self.ledger.release(name) {
            debug!(queue = %self.queue.name, unit = %name, released = ?held, "Released on removal");
        }
        self.dirty = true;
        Some(unit)
    }

    /// Remove a unit for in-place spec replacement. Holdings stay with the
    /// ledger so an admitted unit is not charged twice.
    fn take_for_update(&mut self, name: &str) -> Option<QueueUnit> {
        let unit = self.units.remove(name)?;
        self.dirty = true;
        Some(unit)
    }
}

/// Lazy, finite view over a queue's units in scheduling order
pub struct OrderedUnits<'a> {
    entry: &'a QueueEntry,
    pos: usize,
}

impl<'a> Iterator for OrderedUnits<'a> {
    type Item = &'a QueueUnit;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(name) = self.entry.order.get(self.pos) {
            self.pos += 1;
            if let Some(unit) = self.entry.units.get(name) {
                return Some(unit);
            }
        }
        None
    }
}

/// Units refused or withdrawn while ingesting a snapshot
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Units that could not be indexed, with the reason
    pub refused: Vec<(QueueUnit, DomainError)>,
    /// Units that disappeared from the snapshot
    pub withdrawn: Vec<UnitId>,
    /// Queues that disappeared from the snapshot
    pub dropped_queues: Vec<QueueId>,
    /// Units seen for the first time already Dequeued, admitted by an
    /// earlier engine whose placement may never have reached the actuator
    pub recovered: Vec<UnitId>,
}

/// Index of all queues known to one admission engine
pub struct QueueStore {
    orderer: PriorityOrderer,
    queues: BTreeMap<QueueId, QueueEntry>,
    unit_index: HashMap<UnitId, QueueId>,
}

impl QueueStore {
    pub fn new(orderer: PriorityOrderer) -> Self {
        Self {
            orderer,
            queues: BTreeMap::new(),
            unit_index: HashMap::new(),
        }
    }

    pub fn orderer(&self) -> &PriorityOrderer {
        &self.orderer
    }

    /// Create a queue or apply spec changes to an existing one
    pub fn upsert_queue(&mut self, queue: Queue) {
        match self.queues.get_mut(&queue.name) {
            Some(entry) => {
                entry.queue.spec.priority = queue.spec.priority;
                entry.queue.spec.priority_class_name = queue.spec.priority_class_name;
                entry.apply_policy(queue.spec.policy);
                entry.apply_capability(queue.spec.capability);
            }
            None => {
                info!(queue = %queue.name, policy = %queue.spec.policy, "Queue registered");
                self.queues
                    .insert(queue.name.clone(), QueueEntry::new(queue));
            }
        }
    }

    /// Drop a queue and its units
    pub fn remove_queue(&mut self, name: &str) -> Option<Vec<QueueUnit>> {
        let entry = self.queues.remove(name)?;
        let units: Vec<QueueUnit> = entry.units.into_values().collect();
        for unit in &units {
            self.unit_index.remove(&unit.name);
        }
        info!(queue = %name, units = units.len(), "Queue removed");
        Some(units)
    }

    pub fn update_policy(&mut self, name: &str, policy: QueuePolicy) -> Result<()> {
        self.entry_mut(name)?.apply_policy(policy);
        Ok(())
    }

    /// New capability applies to the next admission; admitted units are not evicted
    pub fn update_capability(&mut self, name: &str, capability: ResourceList) -> Result<()> {
        self.entry_mut(name)?.apply_capability(capability);
        Ok(())
    }

    /// Index a unit under its queue. Known units get their spec replaced
    /// while their engine-owned status is kept.
    ///
    /// # Errors
    /// - `QueueNotFound` if the unit's queue is unknown; the store is unchanged
    pub fn enqueue(&mut self, unit: QueueUnit) -> Result<()> {
        let queue_name = unit.spec.queue.clone();
        if !self.queues.contains_key(&queue_name) {
            return Err(DomainError::QueueNotFound(queue_name));
        }

        let existing = match self.unit_index.get(&unit.name).cloned() {
            Some(current) if current != queue_name => {
                debug!(unit = %unit.name, from = %current, to = %queue_name, "Unit moved between queues");
                self.remove(&unit.name)
            }
            Some(_) => self
                .queues
                .get_mut(&queue_name)
                .and_then(|entry| entry.take_for_update(&unit.name)),
            None => None,
        };

        let mut unit = unit;
        if let Some(known) = existing {
            unit.status = known.status;
        }

        self.unit_index.insert(unit.name.clone(), queue_name.clone());
        if let Some(entry) = self.queues.get_mut(&queue_name) {
            entry.insert(unit);
        }
        Ok(())
    }

    /// Remove a unit, releasing anything it holds
    pub fn remove(&mut self, unit_name: &str) -> Option<QueueUnit> {
        let queue_name = self.unit_index.remove(unit_name)?;
        self.queues.get_mut(&queue_name)?.take(unit_name)
    }

    /// Remove and return the first Enqueued unit in scheduling order
    pub fn dequeue_next(&mut self, queue_name: &str) -> Result<Option<QueueUnit>> {
        let orderer = &self.orderer;
        let entry = self
            .queues
            .get_mut(queue_name)
            .ok_or_else(|| DomainError::QueueNotFound(queue_name.to_string()))?;
        let head = entry
            .ordered(orderer)
            .find(|u| u.phase() == QueueUnitPhase::Enqueued)
            .map(|u| u.name.clone());
        Ok(head.and_then(|name| self.remove(&name)))
    }

    /// Units of a queue in scheduling order
    pub fn peek_ordered(&mut self, queue_name: &str) -> Result<OrderedUnits<'_>> {
        let orderer = &self.orderer;
        let entry = self
            .queues
            .get_mut(queue_name)
            .ok_or_else(|| DomainError::QueueNotFound(queue_name.to_string()))?;
        Ok(entry.ordered(orderer))
    }

    pub fn entry(&self, name: &str) -> Result<&QueueEntry> {
        self.queues
            .get(name)
            .ok_or_else(|| DomainError::QueueNotFound(name.to_string()))
    }

    pub fn entry_mut(&mut self, name: &str) -> Result<&mut QueueEntry> {
        self.queues
            .get_mut(name)
            .ok_or_else(|| DomainError::QueueNotFound(name.to_string()))
    }

    pub fn queue_names(&self) -> impl Iterator<Item = &QueueId> {
        self.queues.keys()
    }

    pub fn unit(&self, name: &str) -> Option<&QueueUnit> {
        let queue = self.unit_index.get(name)?;
        self.queues.get(queue)?.unit(name)
    }

    pub fn unit_count(&self) -> usize {
        self.unit_index.len()
    }

    /// Entries in cycle order (queue priority descending, then name) with the orderer
    pub fn entries_for_cycle(&mut self) -> (&PriorityOrderer, Vec<&mut QueueEntry>) {
        let orderer = &self.orderer;
        let mut entries: Vec<&mut QueueEntry> = self.queues.values_mut().collect();
        entries.sort_by(|a, b| {
            orderer
                .queue_priority(&b.queue)
                .cmp(&orderer.queue_priority(&a.queue))
                .then_with(|| a.queue.name.cmp(&b.queue.name))
        });
        (orderer, entries)
    }

    /// Ingest a full snapshot: upsert and drop queues, upsert units,
    /// withdraw units that are gone. Invalid objects are skipped.
    pub fn sync(&mut self, queues: Vec<Queue>, units: Vec<QueueUnit>) -> SyncReport {
        let mut report = SyncReport::default();

        let mut seen_queues = HashSet::new();
        for queue in queues {
            if let Err(e) = queue.validate() {
                warn!(queue = %queue.name, error = %e, "Skipping invalid queue");
                continue;
            }
            seen_queues.insert(queue.name.clone());
            self.upsert_queue(queue);
        }
        let gone: Vec<QueueId> = self
            .queues
            .keys()
            .filter(|name| !seen_queues.contains(*name))
            .cloned()
            .collect();
        for name in gone {
            self.remove_queue(&name);
            report.dropped_queues.push(name);
        }

        let mut seen_units = HashSet::new();
        for unit in units {
            if let Err(e) = unit.validate() {
                warn!(unit = %unit.name, error = %e, "Skipping invalid unit");
                continue;
            }
            seen_units.insert(unit.name.clone());
            let name = unit.name.clone();
            let first_seen_dequeued =
                unit.phase() == QueueUnitPhase::Dequeued && !self.unit_index.contains_key(&name);
            let refused_copy = unit.clone();
            match self.enqueue(unit) {
                Ok(()) if first_seen_dequeued => report.recovered.push(name),
                Ok(()) => {}
                Err(e) => {
                    warn!(unit = %name, error = %e, "Unit refused");
                    // a known unit whose queue vanished stops holding capacity
                    let known = self.remove(&name);
                    let mut refused = refused_copy;
                    if let Some(known) = known {
                        refused.status = known.status;
                    }
                    report.refused.push((refused, e));
                }
            }
        }

        let withdrawn: Vec<UnitId> = self
            .unit_index
            .keys()
            .filter(|name| !seen_units.contains(*name))
            .cloned()
            .collect();
        for name in withdrawn {
            if self.remove(&name).is_some() {
                info!(unit = %name, "Unit withdrawn");
            }
            report.withdrawn.push(name);
        }
        report.withdrawn.sort();

        report
    }
}
