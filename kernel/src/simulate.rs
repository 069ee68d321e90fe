// Scripted Terminal Simulation
//
// Drives the lifecycle manager from a list of steps on a manual clock:
// step -> manager operation -> deferred tasks -> invariant check.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, ManualClock};
use crate::config::{ConfigError, ParkingConfig};
use crate::gate::{GateState, Lane};
use crate::invariants::{InvariantEngine, InvariantViolation};
use crate::log::{LogEntry, LogError};
use crate::manager::{Operation, Outcome, ParkingManager};
use crate::source::PlateSource;
use crate::state::{PendingTransaction, Stats, VehicleRecord};

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Plate presented directly at the entrance, no scan latency.
    Enter { plate: String },
    ExitScan { plate: String },
    Pay,
    CompleteExit,
    /// Let the plate source read a plate at `lane`.
    Scan { lane: Lane },
    Upload { lane: Lane, file_name: String },
    Demo,
    Advance {
        #[serde(default)]
        minutes: i64,
        #[serde(default)]
        seconds: i64,
    },
    /// Run the clock forward until no deferred task remains.
    Settle,
}

/// Errors that abort a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("config rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("activity log failed: {0}")]
    Log(#[from] LogError),

    #[error("{0}")]
    Invariant(#[from] InvariantViolation),

    #[error("cannot move the clock backwards ({0})")]
    NegativeAdvance(Duration),

    #[error("advance of {minutes} minutes and {seconds} seconds is out of range")]
    AdvanceOutOfRange { minutes: i64, seconds: i64 },

    #[error("advancing the clock by {0} runs past the calendar")]
    ClockOverflow(Duration),
}

/// Admin dashboard view of the lot.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub now: DateTime<Utc>,
    pub stats: Stats,
    pub entrance_gate: GateState,
    pub exit_gate: GateState,
    pub pending: Option<PendingTransaction>,
    pub vehicles: Vec<VehicleRecord>,
    pub logs: Vec<LogEntry>,
}

pub struct Simulation {
    clock: Arc<ManualClock>,
    manager: ParkingManager,
    source: Box<dyn PlateSource>,
    invariants: InvariantEngine,
}

impl Simulation {
    pub fn new<P: PlateSource + 'static>(
        config: ParkingConfig,
        start: DateTime<Utc>,
        source: P,
    ) -> Result<Self, SimulationError> {
        let clock = Arc::new(ManualClock::starting_at(start));
        let manager = ParkingManager::new(config, clock.clone())?;

        Ok(Self {
            clock,
            manager,
            source: Box::new(source),
            invariants: InvariantEngine::with_defaults(),
        })
    }

    pub fn manager(&self) -> &ParkingManager {
        &self.manager
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Apply one step, run whatever fell due, then check invariants.
    pub fn apply(&mut self, step: &Step) -> Result<Vec<Outcome>, SimulationError> {
        debug!(?step, "applying step");

        let mut outcomes = match step {
            Step::Enter { plate } => vec![Outcome::from_result(
                Operation::Entry,
                self.manager.register_entry(plate),
                |vehicle| Outcome::Entered { vehicle },
            )?],
            Step::ExitScan { plate } => vec![Outcome::from_result(
                Operation::ExitScan,
                self.manager.register_exit_scan(plate),
                |transaction| Outcome::ExitScanned { transaction },
            )?],
            Step::Pay => vec![Outcome::from_result(
                Operation::Payment,
                self.manager.confirm_payment(),
                |transaction| Outcome::Paid { transaction },
            )?],
            Step::CompleteExit => vec![Outcome::from_result(
                Operation::CompleteExit,
                self.manager.complete_exit(),
                |vehicle| Outcome::ExitCompleted { vehicle },
            )?],
            Step::Scan { lane } => self.scan(*lane)?,
            Step::Upload { lane, file_name } => self.upload(*lane, file_name)?,
            Step::Demo => vec![Outcome::from_result(
                Operation::Scan,
                self.manager.start_demo(),
                |()| Outcome::DemoStarted,
            )?],
            Step::Advance { minutes, seconds } => {
                let by = Duration::try_minutes(*minutes)
                    .zip(Duration::try_seconds(*seconds))
                    .and_then(|(m, s)| m.checked_add(&s))
                    .ok_or(SimulationError::AdvanceOutOfRange {
                        minutes: *minutes,
                        seconds: *seconds,
                    })?;
                return self.advance(by);
            }
            Step::Settle => return self.settle(),
        };

        outcomes.extend(self.manager.run_due()?);
        self.check()?;
        Ok(outcomes)
    }

    /// Apply every step in order, collecting all outcomes.
    pub fn run(&mut self, steps: &[Step]) -> Result<Vec<Outcome>, SimulationError> {
        let mut outcomes = Vec::new();
        for step in steps {
            outcomes.extend(self.apply(step)?);
        }
        Ok(outcomes)
    }

    /// Move the clock forward, firing tasks at their due times on the way.
    pub fn advance(&mut self, by: Duration) -> Result<Vec<Outcome>, SimulationError> {
        if by < Duration::zero() {
            return Err(SimulationError::NegativeAdvance(by));
        }

        let target = self
            .clock
            .now()
            .checked_add_signed(by)
            .ok_or(SimulationError::ClockOverflow(by))?;
        let mut outcomes = Vec::new();

        while let Some(due) = self.manager.next_deadline().filter(|due| *due <= target) {
            self.clock.set(due.max(self.clock.now()));
            outcomes.extend(self.manager.run_due()?);
            self.check()?;
        }

        self.clock.set(target);
        outcomes.extend(self.manager.run_due()?);
        self.check()?;
        Ok(outcomes)
    }

    /// Fire deferred tasks until none remain.
    pub fn settle(&mut self) -> Result<Vec<Outcome>, SimulationError> {
        let mut outcomes = Vec::new();

        while let Some(due) = self.manager.next_deadline() {
            self.clock.set(due.max(self.clock.now()));
            outcomes.extend(self.manager.run_due()?);
            self.check()?;
        }

        Ok(outcomes)
    }

    pub fn dashboard(&self) -> Result<Dashboard, SimulationError> {
        Ok(Dashboard {
            now: self.clock.now(),
            stats: self.manager.stats(),
            entrance_gate: self.manager.gate_state(Lane::Entrance),
            exit_gate: self.manager.gate_state(Lane::Exit),
            pending: self.manager.pending().cloned(),
            vehicles: self.manager.vehicles().to_vec(),
            logs: self.manager.logs()?,
        })
    }

    fn scan(&mut self, lane: Lane) -> Result<Vec<Outcome>, SimulationError> {
        let Some(plate) = self.source.read_plate() else {
            return Ok(vec![Outcome::Rejected {
                operation: Operation::Scan,
                reason: "no plate recognized".to_string(),
            }]);
        };

        Ok(vec![Outcome::from_result(
            Operation::Scan,
            self.manager.submit_scan(lane, &plate),
            |()| Outcome::ScanQueued { lane, plate: plate.clone() },
        )?])
    }

    fn upload(&mut self, lane: Lane, file_name: &str) -> Result<Vec<Outcome>, SimulationError> {
        let Some(plate) = self.source.read_plate() else {
            return Ok(vec![Outcome::Rejected {
                operation: Operation::Scan,
                reason: format!("no plate recognized in {file_name}"),
            }]);
        };

        // The plate itself is only reported once the image has been read.
        Ok(vec![Outcome::from_result(
            Operation::Scan,
            self.manager.submit_upload(lane, file_name, &plate),
            |()| Outcome::UploadQueued {
                lane,
                file_name: file_name.to_string(),
            },
        )?])
    }

    fn check(&self) -> Result<(), SimulationError> {
        self.invariants.evaluate(&self.manager.snapshot())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogAction;
    use crate::source::SequencePlateSource;
    use crate::state::VehicleStatus;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn simulation(plates: &[&str]) -> Simulation {
        Simulation::new(
            ParkingConfig::default(),
            start(),
            SequencePlateSource::new(plates.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn full_simulation_pipeline_runs() {
        let mut sim = simulation(&["B1234ABC", "B1234ABC"]);

        let steps = vec![
            Step::Scan {
                lane: Lane::Entrance,
            },
            Step::Advance {
                minutes: 70,
                seconds: 0,
            },
            Step::Scan { lane: Lane::Exit },
            Step::Advance {
                minutes: 0,
                seconds: 2,
            },
            Step::Pay,
            Step::Settle,
        ];

        let outcomes = sim.run(&steps).unwrap();

        let scanned = outcomes
            .iter()
            .find_map(|o| match o {
                Outcome::ExitScanned { transaction } => Some(transaction.clone()),
                _ => None,
            })
            .unwrap();
        // Entry lands after the 1.5s scan latency.
        assert_eq!(scanned.duration, 70);
        assert_eq!(scanned.cost, 6000);

        let dashboard = sim.dashboard().unwrap();
        assert_eq!(dashboard.stats.revenue, 6000);
        assert_eq!(dashboard.stats.parked, 0);
        assert_eq!(dashboard.vehicles[0].status, VehicleStatus::Exited);
        assert_eq!(dashboard.exit_gate, GateState::Closed);
        assert!(dashboard.pending.is_none());
        assert_eq!(dashboard.logs[0].action, LogAction::GateClosed);
    }

    #[test]
    fn advance_fires_tasks_at_their_due_time() {
        let mut sim = simulation(&["D5678XYZ"]);
        sim.apply(&Step::Upload {
            lane: Lane::Entrance,
            file_name: "car.jpg".into(),
        })
        .unwrap();

        let outcomes = sim.advance(Duration::seconds(10)).unwrap();

        let entered = outcomes
            .iter()
            .find_map(|o| match o {
                Outcome::Entered { vehicle } => Some(vehicle.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(entered.entry_time, start() + Duration::milliseconds(2500));
        assert!(outcomes.contains(&Outcome::GateClosed {
            lane: Lane::Entrance
        }));
        assert_eq!(sim.now(), start() + Duration::seconds(10));
    }

    #[test]
    fn demo_settles_with_vehicle_parked() {
        let mut sim = simulation(&[]);
        sim.run(&[Step::Demo, Step::Settle]).unwrap();

        let dashboard = sim.dashboard().unwrap();
        assert_eq!(dashboard.stats.parked, 1);
        assert_eq!(dashboard.entrance_gate, GateState::Closed);
        assert_eq!(
            dashboard.logs.last().map(|e| e.action),
            Some(LogAction::Demo)
        );
    }

    #[test]
    fn exhausted_source_is_reported() {
        let mut sim = simulation(&[]);
        let outcomes = sim.apply(&Step::Scan { lane: Lane::Exit }).unwrap();

        assert!(matches!(
            outcomes.as_slice(),
            [Outcome::Rejected {
                operation: Operation::Scan,
                ..
            }]
        ));
    }

    #[test]
    fn rejections_do_not_abort_the_run() {
        let mut sim = simulation(&[]);
        let outcomes = sim
            .run(&[
                Step::Enter {
                    plate: "12345".into(),
                },
                Step::Pay,
                Step::ExitScan {
                    plate: "B1234ABC".into(),
                },
            ])
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, Outcome::Rejected { .. })));
        assert_eq!(sim.dashboard().unwrap().logs.len(), 3);
    }

    #[test]
    fn negative_advance_is_refused() {
        let mut sim = simulation(&[]);
        let err = sim
            .apply(&Step::Advance {
                minutes: -5,
                seconds: 0,
            })
            .unwrap_err();

        assert!(matches!(err, SimulationError::NegativeAdvance(_)));
    }

    #[test]
    fn oversized_advance_is_refused() {
        let mut sim = simulation(&[]);

        let err = sim
            .apply(&Step::Advance {
                minutes: i64::MAX,
                seconds: 0,
            })
            .unwrap_err();
        assert!(matches!(err, SimulationError::AdvanceOutOfRange { .. }));

        let err = sim.advance(Duration::MAX).unwrap_err();
        assert!(matches!(err, SimulationError::ClockOverflow(_)));
        assert_eq!(sim.now(), start());
    }

    #[test]
    fn steps_parse_from_json() {
        let json = r#"[
            { "op": "enter", "plate": "B1234ABC" },
            { "op": "advance", "minutes": 70 },
            { "op": "scan", "lane": "exit" },
            { "op": "upload", "lane": "entrance", "file_name": "car.jpg" },
            { "op": "pay" },
            { "op": "settle" }
        ]"#;

        let steps: Vec<Step> = serde_json::from_str(json).unwrap();
        assert_eq!(steps.len(), 6);
        assert_eq!(
            steps[1],
            Step::Advance {
                minutes: 70,
                seconds: 0
            }
        );
        assert_eq!(steps[2], Step::Scan { lane: Lane::Exit });
    }
}
