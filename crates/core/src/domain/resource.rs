// Resource Domain Model - quantities and resource lists

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// Resource kind name (e.g. "cpu", "memory", "nvidia.com/gpu")
pub type ResourceName = String;

const MILLI_PER_UNIT: i128 = 1000;

/// Resource amount stored as milli-units.
///
/// Parses cluster-style quantity strings: `"4"`, `"1.5"`, `"500m"`,
/// decimal SI suffixes (`k M G T P E`) and binary suffixes (`Ki .. Ei`).
/// Fractions below one milli-unit round up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "QuantityRepr", into = "String")]
pub struct Quantity(i64);

/// Wire representation: quantities arrive as strings or plain integers
#[derive(Deserialize)]
#[serde(untagged)]
enum QuantityRepr {
    Text(String),
    Int(i64),
}

impl TryFrom<QuantityRepr> for Quantity {
    type Error = DomainError;

    fn try_from(repr: QuantityRepr) -> Result<Self, Self::Error> {
        match repr {
            QuantityRepr::Text(s) => s.parse(),
            QuantityRepr::Int(v) => Quantity::from_units(v),
        }
    }
}

impl From<Quantity> for String {
    fn from(q: Quantity) -> Self {
        q.to_string()
    }
}

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    /// Build from whole units (e.g. 4 cpus)
    pub fn from_units(units: i64) -> Result<Self, DomainError> {
        if units < 0 {
            return Err(DomainError::InvalidQuantity(units.to_string()));
        }
        units
            .checked_mul(MILLI_PER_UNIT as i64)
            .map(Quantity)
            .ok_or_else(|| DomainError::InvalidQuantity(units.to_string()))
    }

    /// Build from milli-units
    pub fn from_milli(milli: i64) -> Result<Self, DomainError> {
        if milli < 0 {
            return Err(DomainError::InvalidQuantity(format!("{}m", milli)));
        }
        Ok(Quantity(milli))
    }

    pub fn milli(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.0))
    }

    /// Subtract, clamping at zero. Returns the clamped value and whether it underflowed.
    pub fn clamped_sub(self, other: Quantity) -> (Quantity, bool) {
        if other.0 > self.0 {
            (Quantity::ZERO, true)
        } else {
            (Quantity(self.0 - other.0), false)
        }
    }
}

fn suffix_multiplier(suffix: &str) -> Option<i128> {
    let m = match suffix {
        "" => 1,
        "k" => 1_000,
        "M" => 1_000_000,
        "G" => 1_000_000_000,
        "T" => 1_000_000_000_000,
        "P" => 1_000_000_000_000_000,
        "E" => 1_000_000_000_000_000_000,
        "Ki" => 1 << 10,
        "Mi" => 1 << 20,
        "Gi" => 1 << 30,
        "Ti" => 1 << 40,
        "Pi" => 1 << 50,
        "Ei" => 1 << 60,
        _ => return None,
    };
    Some(m)
}

impl FromStr for Quantity {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidQuantity(raw.to_string());
        let s = raw.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        if number.is_empty() {
            return Err(invalid());
        }

        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        // i128 holds 10^36; longer fractions add nothing at milli precision
        if int_part.len() + frac_part.len() > 36 {
            return Err(invalid());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let numerator: i128 = digits.parse().map_err(|_| invalid())?;
        let denominator: i128 = 10i128.pow(frac_part.len() as u32);

        // "m" is the only sub-unit suffix
        let scaled = if suffix == "m" {
            numerator
        } else {
            let multiplier = suffix_multiplier(suffix).ok_or_else(invalid)?;
            numerator
                .checked_mul(multiplier)
                .and_then(|v| v.checked_mul(MILLI_PER_UNIT))
                .ok_or_else(invalid)?
        };

        // round up to the next milli-unit
        let milli = (scaled + denominator - 1) / denominator;
        i64::try_from(milli).map(Quantity).map_err(|_| invalid())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % MILLI_PER_UNIT as i64 == 0 {
            write!(f, "{}", self.0 / MILLI_PER_UNIT as i64)
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

/// Resource kind -> quantity, ordered for deterministic iteration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceList(BTreeMap<ResourceName, Quantity>);

impl ResourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for tests and seed data
    pub fn with(mut self, name: impl Into<String>, quantity: Quantity) -> Self {
        self.0.insert(name.into(), quantity);
        self
    }

    pub fn get(&self, name: &str) -> Option<Quantity> {
        self.0.get(name).copied()
    }

    /// Quantity for `name`, zero when absent
    pub fn amount(&self, name: &str) -> Quantity {
        self.get(name).unwrap_or(Quantity::ZERO)
    }

    pub fn insert(&mut self, name: impl Into<String>, quantity: Quantity) {
        self.0.insert(name.into(), quantity);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceName, &Quantity)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &ResourceName> {
        self.0.keys()
    }

    /// Add every kind of `other` into self
    pub fn add(&mut self, other: &ResourceList) {
        for (name, q) in other.iter() {
            let current = self.amount(name);
            self.0.insert(name.clone(), current.saturating_add(*q));
        }
    }

    /// Subtract every kind of `other`, clamping at zero.
    /// Returns the kinds that would have gone negative.
    pub fn sub_clamped(&mut self, other: &ResourceList) -> Vec<ResourceName> {
        let mut underflowed = Vec::new();
        for (name, q) in other.iter() {
            let (rest, underflow) = self.amount(name).clamped_sub(*q);
            if underflow {
                underflowed.push(name.clone());
            }
            self.0.insert(name.clone(), rest);
        }
        underflowed
    }

    /// True if every kind declared in `ceiling` is within it.
    /// Kinds missing from `ceiling` are unbounded.
    pub fn fits_within(&self, ceiling: &ResourceList) -> bool {
        ceiling.iter().all(|(name, max)| self.amount(name) <= *max)
    }

    /// Drop kinds with zero quantity
    pub fn prune_zero(&mut self) {
        self.0.retain(|_, q| !q.is_zero());
    }
}

impl FromIterator<(ResourceName, Quantity)> for ResourceList {
    fn from_iter<I: IntoIterator<Item = (ResourceName, Quantity)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Shorthand for tests and seed data: `resources(&[("cpu", "4"), ("memory", "1Gi")])`
pub fn resources(pairs: &[(&str, &str)]) -> Result<ResourceList, DomainError> {
    pairs
        .iter()
        .map(|(name, q)| Ok((name.to_string(), q.parse::<Quantity>()?)))
        .collect()
}
