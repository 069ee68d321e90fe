// Invariant Framework
//
// Invariants are pure rules over the lot that must hold after every
// operation, whatever order the operations arrive in.

use std::collections::BTreeSet;

use crate::log::ActivityLog;
use crate::replay::replay_occupancy;
use crate::state::{PendingTransaction, Stats, VehicleRecord};

/// Read-only view of everything the manager owns.
#[derive(Debug, Clone, Copy)]
pub struct LotSnapshot<'a> {
    pub vehicles: &'a [VehicleRecord],
    pub pending: Option<&'a PendingTransaction>,
    pub log: &'a ActivityLog,
}

/// Result of invariant evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantResult {
    Pass,
    Fail(String),
}

/// Trait implemented by all invariants.
///
/// Invariants must be:
/// - Pure
/// - Deterministic
/// - Side-effect free
pub trait Invariant: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(&self, lot: &LotSnapshot<'_>) -> InvariantResult;
}

/// Invariant engine that evaluates a set of invariants.
#[derive(Default)]
pub struct InvariantEngine {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantEngine {
    /// Create an empty invariant engine.
    pub fn new() -> Self {
        Self {
            invariants: Vec::new(),
        }
    }

    /// Engine preloaded with every built-in lot invariant.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.register(SingleActivePlate);
        engine.register(ParkedCountMatches);
        engine.register(RevenueMatchesPaid);
        engine.register(PendingIsParked);
        engine.register(LogMatchesOccupancy);
        engine
    }

    /// Register an invariant.
    pub fn register<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    /// Evaluate all invariants.
    ///
    /// Stops at the first failure.
    pub fn evaluate(&self, lot: &LotSnapshot<'_>) -> Result<(), InvariantViolation> {
        for invariant in &self.invariants {
            if let InvariantResult::Fail(reason) = invariant.validate(lot) {
                return Err(InvariantViolation {
                    invariant: invariant.name(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

/// Returned when an invariant is violated.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invariant `{invariant}` violated: {reason}")]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub reason: String,
}

/// A plate is parked at most once.
pub struct SingleActivePlate;

impl Invariant for SingleActivePlate {
    fn name(&self) -> &'static str {
        "single-active-plate"
    }

    fn validate(&self, lot: &LotSnapshot<'_>) -> InvariantResult {
        let mut seen = BTreeSet::new();
        for v in lot.vehicles.iter().filter(|v| v.is_parked()) {
            if !seen.insert(&v.plate) {
                return InvariantResult::Fail(format!("{} is parked twice", v.plate));
            }
        }
        InvariantResult::Pass
    }
}

/// `parked` statistic equals the number of parked records.
pub struct ParkedCountMatches;

impl Invariant for ParkedCountMatches {
    fn name(&self) -> &'static str {
        "parked-count-matches"
    }

    fn validate(&self, lot: &LotSnapshot<'_>) -> InvariantResult {
        let stats = Stats::derive(lot.vehicles);
        let parked = lot.vehicles.iter().filter(|v| v.is_parked()).count();

        if stats.parked == parked && stats.total == lot.vehicles.len() {
            InvariantResult::Pass
        } else {
            InvariantResult::Fail(format!(
                "stats report {} parked of {}, records show {parked} of {}",
                stats.parked,
                stats.total,
                lot.vehicles.len()
            ))
        }
    }
}

/// Revenue is the sum of costs over paid records, and paid records are priced.
pub struct RevenueMatchesPaid;

impl Invariant for RevenueMatchesPaid {
    fn name(&self) -> &'static str {
        "revenue-matches-paid"
    }

    fn validate(&self, lot: &LotSnapshot<'_>) -> InvariantResult {
        if let Some(v) = lot.vehicles.iter().find(|v| v.paid && v.cost.is_none()) {
            return InvariantResult::Fail(format!("{} is paid but has no cost", v.plate));
        }

        let expected = lot
            .vehicles
            .iter()
            .filter(|v| v.paid)
            .filter_map(|v| v.cost)
            .fold(0u64, u64::saturating_add);
        let revenue = Stats::derive(lot.vehicles).revenue;

        if revenue == expected {
            InvariantResult::Pass
        } else {
            InvariantResult::Fail(format!("revenue {revenue} != paid total {expected}"))
        }
    }
}

/// The pending transaction belongs to a vehicle that is still parked.
pub struct PendingIsParked;

impl Invariant for PendingIsParked {
    fn name(&self) -> &'static str {
        "pending-is-parked"
    }

    fn validate(&self, lot: &LotSnapshot<'_>) -> InvariantResult {
        let Some(pending) = lot.pending else {
            return InvariantResult::Pass;
        };

        match lot.vehicles.iter().find(|v| v.id == pending.vehicle_id) {
            Some(v) if v.is_parked() && v.plate == pending.plate => InvariantResult::Pass,
            Some(v) => InvariantResult::Fail(format!(
                "pending exit for {} refers to a vehicle that is not parked",
                v.plate
            )),
            None => InvariantResult::Fail(format!(
                "pending exit for {} has no vehicle record",
                pending.plate
            )),
        }
    }
}

/// Occupancy replayed from the activity log equals the parked records.
pub struct LogMatchesOccupancy;

impl Invariant for LogMatchesOccupancy {
    fn name(&self) -> &'static str {
        "log-matches-occupancy"
    }

    fn validate(&self, lot: &LotSnapshot<'_>) -> InvariantResult {
        let entries = match lot.log.replay() {
            Ok(entries) => entries,
            Err(err) => return InvariantResult::Fail(err.to_string()),
        };
        let replayed = match replay_occupancy(&entries) {
            Ok(inside) => inside,
            Err(err) => return InvariantResult::Fail(err.to_string()),
        };

        let parked: BTreeSet<String> = lot
            .vehicles
            .iter()
            .filter(|v| v.is_parked())
            .map(|v| v.plate.to_string())
            .collect();

        if replayed == parked {
            InvariantResult::Pass
        } else {
            InvariantResult::Fail(format!(
                "log says {replayed:?} inside, records say {parked:?}"
            ))
        }
    }
}
