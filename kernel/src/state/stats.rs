// Dashboard Statistics
//
// Derived on demand from vehicle records, never stored.

use serde::Serialize;

use crate::fee::Amount;
use crate::state::VehicleRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub parked: usize,
    pub revenue: Amount,
}

impl Stats {
    pub fn derive(vehicles: &[VehicleRecord]) -> Self {
        vehicles.iter().fold(Stats::default(), |mut stats, v| {
            stats.total += 1;
            if v.is_parked() {
                stats.parked += 1;
            }
            if v.paid {
                stats.revenue = stats.revenue.saturating_add(v.cost.unwrap_or(0));
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::Plate;
    use crate::state::VehicleStatus;
    use chrono::Utc;

    fn record(plate: &str, status: VehicleStatus, paid: bool, cost: Option<Amount>) -> VehicleRecord {
        VehicleRecord {
            status,
            paid,
            cost,
            ..VehicleRecord::parked(Plate::parse(plate).unwrap(), Utc::now())
        }
    }

    #[test]
    fn counts_and_revenue() {
        let vehicles = vec![
            record("B1234ABC", VehicleStatus::Exited, true, Some(6000)),
            record("D5678XYZ", VehicleStatus::Parked, true, Some(3000)),
            record("B9999KLM", VehicleStatus::Parked, false, None),
        ];

        let stats = Stats::derive(&vehicles);
        assert_eq!(
            stats,
            Stats {
                total: 3,
                parked: 2,
                revenue: 9000
            }
        );
    }

    #[test]
    fn revenue_saturates_instead_of_wrapping() {
        let vehicles = vec![
            record("B1234ABC", VehicleStatus::Exited, true, Some(Amount::MAX)),
            record("D5678XYZ", VehicleStatus::Exited, true, Some(3000)),
        ];

        assert_eq!(Stats::derive(&vehicles).revenue, Amount::MAX);
    }

    #[test]
    fn empty_lot() {
        assert_eq!(Stats::derive(&[]), Stats::default());
    }
}
