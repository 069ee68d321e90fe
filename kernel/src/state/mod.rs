// Vehicle Lifecycle State Machine
//
// Encodes which lifecycle events are legal in which phase:
// parked -> exit scanned -> paid -> exited.
// This module is pure, deterministic, and side-effect free.

use serde::{Deserialize, Serialize};

pub mod record;
pub mod stats;

pub use record::{PendingTransaction, VehicleId, VehicleRecord};
pub use stats::Stats;

/// Coarse status stored on a vehicle record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Parked,
    Exited,
}

/// Fine-grained phase of a vehicle's stay.
///
/// Every phase except `Exited` maps to `VehicleStatus::Parked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Parked,
    AwaitingPayment,
    Paid,
    Exited,
}

impl LifecyclePhase {
    pub fn status(self) -> VehicleStatus {
        match self {
            LifecyclePhase::Exited => VehicleStatus::Exited,
            _ => VehicleStatus::Parked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    ExitScanned,
    PaymentConfirmed,
    ExitCompleted,
}

/// Errors produced during lifecycle transitions.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StateError {
    #[error("illegal lifecycle transition: cannot apply {event:?} while {phase:?}")]
    IllegalTransition {
        phase: LifecyclePhase,
        event: LifecycleEvent,
    },
}

/// Compute the phase that follows `event`.
pub fn transition(
    phase: LifecyclePhase,
    event: LifecycleEvent,
) -> Result<LifecyclePhase, StateError> {
    use LifecycleEvent::*;
    use LifecyclePhase::*;

    match (phase, event) {
        (Parked, ExitScanned) => Ok(AwaitingPayment),
        (AwaitingPayment, PaymentConfirmed) => Ok(Paid),
        (Paid, ExitCompleted) => Ok(Exited),
        (phase, event) => Err(StateError::IllegalTransition { phase, event }),
    }
}
