use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fee::Amount;
use crate::plate::Plate;
use crate::state::{LifecyclePhase, VehicleStatus};

/// Stable identifier for a single stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub Uuid);

impl VehicleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VehicleId {
    fn default() -> Self {
        Self::new()
    }
}

/// One stay of one vehicle, from entry to exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: VehicleId,
    pub plate: Plate,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub status: VehicleStatus,
    pub paid: bool,
    pub cost: Option<Amount>,
}

impl VehicleRecord {
    pub fn parked(plate: Plate, entry_time: DateTime<Utc>) -> Self {
        Self {
            id: VehicleId::new(),
            plate,
            entry_time,
            exit_time: None,
            status: VehicleStatus::Parked,
            paid: false,
            cost: None,
        }
    }

    pub fn is_parked(&self) -> bool {
        self.status == VehicleStatus::Parked
    }
}

/// The single in-flight exit: computed at exit scan, settled by payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingTransaction {
    pub vehicle_id: VehicleId,
    pub plate: Plate,
    pub entry_time: DateTime<Utc>,
    pub scanned_at: DateTime<Utc>,
    /// Whole minutes parked, rounded down.
    pub duration: u64,
    pub cost: Amount,
    pub phase: LifecyclePhase,
}

impl PendingTransaction {
    pub fn is_paid(&self) -> bool {
        self.phase == LifecyclePhase::Paid
    }
}
