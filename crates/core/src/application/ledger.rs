//! CapacityLedger - allocated vs. capability for one queue
//!
//! A resource kind absent from `capability` has no ceiling: requests for it
//! are always admitted and only tracked in `allocated`.
//!
//! Holdings are recorded per unit, so a unit is charged at most once and
//! released at most once regardless of how often an outcome is reported.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{Quantity, ResourceList, ResourceName, UnitId};

/// Why an admission was denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub resource: ResourceName,
    pub requested: Quantity,
    pub allocated: Quantity,
    pub capability: Quantity,
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "insufficient {}: requested {}, allocated {}, capability {}",
            self.resource, self.requested, self.allocated, self.capability
        )
    }
}

/// Result of `try_admit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// The unit already holds resources; nothing was charged again
    AlreadyHeld,
    Denied(Denial),
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        !matches!(self, Admission::Denied(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapacityLedger {
    capability: ResourceList,
    allocated: ResourceList,
    holdings: BTreeMap<UnitId, ResourceList>,
}

impl CapacityLedger {
    pub fn new(capability: ResourceList) -> Self {
        Self {
            capability,
            ..Default::default()
        }
    }

    pub fn capability(&self) -> &ResourceList {
        &self.capability
    }

    pub fn allocated(&self) -> &ResourceList {
        &self.allocated
    }

    pub fn holds(&self, unit: &str) -> bool {
        self.holdings.contains_key(unit)
    }

    /// Takes effect on the next `try_admit`; current holdings are kept
    pub fn set_capability(&mut self, capability: ResourceList) {
        self.capability = capability;
    }

    /// Check every kind in capability or request: allocated + request <= capability
    pub fn fits(&self, request: &ResourceList) -> Result<(), Denial> {
        // kinds only in the request have no ceiling
        for (kind, ceiling) in self.capability.iter() {
            let ceiling = *ceiling;
            let requested = request.amount(kind);
            let allocated = self.allocated.amount(kind);
            if allocated.saturating_add(requested) > ceiling {
                return Err(Denial {
                    resource: kind.clone(),
                    requested,
                    allocated,
                    capability: ceiling,
                });
            }
        }
        Ok(())
    }

    /// Charge `request` to `unit` if it fits. All kinds are charged together or not at all.
    pub fn try_admit(&mut self, unit: &str, request: &ResourceList) -> Admission {
        if self.holds(unit) {
            return Admission::AlreadyHeld;
        }
        match self.fits(request) {
            Ok(()) => {
                self.allocated.add(request);
                self.holdings.insert(unit.to_string(), request.clone());
                Admission::Granted
            }
            Err(denial) => {
                debug!(unit = %unit, %denial, "Admission denied");
                Admission::Denied(denial)
            }
        }
    }

    /// Charge without a ceiling check, for units already admitted before this ledger existed
    pub fn restore(&mut self, unit: &str, request: &ResourceList) {
        if self.holds(unit) {
            return;
        }
        self.allocated.add(request);
        self.holdings.insert(unit.to_string(), request.clone());
    }

    /// Release what `unit` holds. Returns `None` if it held nothing.
    pub fn release(&mut self, unit: &str) -> Option<ResourceList> {
        let held = self.holdings.remove(unit)?;
        self.release_request(&held);
        Some(held)
    }

    /// Subtract a raw request, clamping each kind at zero
    pub fn release_request(&mut self, request: &ResourceList) {
        let underflowed = self.allocated.sub_clamped(request);
        for kind in underflowed {
            warn!(
                resource = %kind,
                "Ledger underflow: release exceeds allocated, clamped to zero"
            );
        }
        self.allocated.prune_zero();
    }
}
