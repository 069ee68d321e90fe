// Vehicle Lifecycle Manager
//
// Owns every vehicle record, the activity log, the single pending exit
// transaction, both gates and the deferred task queue. The presentation
// layer only ever goes through these methods.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{ConfigError, ParkingConfig};
use crate::fee::{format_rupiah, FeeSchedule};
use crate::gate::{GateState, Gates, Lane};
use crate::invariants::LotSnapshot;
use crate::log::{ActivityLog, LogAction, LogEntry, LogError, SYSTEM_SUBJECT, UPLOAD_SUBJECT};
use crate::plate::{normalize, Plate};
use crate::schedule::{deadline, DeadlineOverflow, Scheduler};
use crate::state::{
    transition, LifecycleEvent, LifecyclePhase, PendingTransaction, StateError, Stats, VehicleId,
    VehicleRecord,
};

/// Plate the demo run drives through the entrance.
pub const DEMO_PLATE: &str = "B1234ABC";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("invalid plate format: {0:?}")]
    InvalidPlateFormat(String),

    #[error("vehicle {0} is already parked")]
    AlreadyParked(Plate),

    #[error(transparent)]
    Schedule(#[from] DeadlineOverflow),

    #[error(transparent)]
    Log(#[from] LogError),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExitError {
    #[error("no parked vehicle with plate {0:?}")]
    VehicleNotFound(String),

    #[error("exit transaction for {0} is still in progress")]
    TransactionInProgress(Plate),

    #[error("no pending exit transaction")]
    NoPendingTransaction,

    #[error("exit for {0} has not been paid")]
    PaymentOutstanding(Plate),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Schedule(#[from] DeadlineOverflow),

    #[error(transparent)]
    Log(#[from] LogError),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("no pending exit transaction")]
    NoPendingTransaction,

    #[error("exit for {0} is already paid")]
    AlreadyPaid(Plate),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Schedule(#[from] DeadlineOverflow),

    #[error(transparent)]
    Log(#[from] LogError),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("a plate scan is already in progress")]
    ScanInProgress,

    #[error(transparent)]
    Schedule(#[from] DeadlineOverflow),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// Operation errors that can carry an activity-log failure.
///
/// A log failure is the only thing that aborts a simulation; every other
/// error is an ordinary rejection reported back to the caller.
pub trait Rejection: std::fmt::Display + Sized {
    fn into_log_error(self) -> Result<LogError, Self>;
}

macro_rules! impl_rejection {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Rejection for $ty {
                fn into_log_error(self) -> Result<LogError, Self> {
                    match self {
                        Self::Log(err) => Ok(err),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

impl_rejection!(EntryError, ExitError, PaymentError, ScanError);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Scan,
    Entry,
    ExitScan,
    Payment,
    CompleteExit,
}

/// What happened as the result of an operation or a deferred task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    ScanQueued { lane: Lane, plate: String },
    UploadQueued { lane: Lane, file_name: String },
    DemoStarted,
    Entered { vehicle: VehicleRecord },
    ExitScanned { transaction: PendingTransaction },
    Paid { transaction: PendingTransaction },
    ExitCompleted { vehicle: VehicleRecord },
    GateClosed { lane: Lane },
    Rejected { operation: Operation, reason: String },
}

impl Outcome {
    /// Fold an operation result into an outcome, surfacing log failures.
    pub fn from_result<T, E: Rejection>(
        operation: Operation,
        result: Result<T, E>,
        ok: impl FnOnce(T) -> Outcome,
    ) -> Result<Outcome, LogError> {
        match result {
            Ok(value) => Ok(ok(value)),
            Err(err) => match err.into_log_error() {
                Ok(log_err) => Err(log_err),
                Err(err) => Ok(Outcome::Rejected {
                    operation,
                    reason: err.to_string(),
                }),
            },
        }
    }
}

/// Continuations the manager runs once their delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredTask {
    /// A plate becomes visible to the lane camera.
    DetectPlate {
        lane: Lane,
        plate: String,
        details: String,
    },
    /// Scan latency has elapsed; hand the plate to entry or exit.
    ProcessScan { lane: Lane, plate: String },
    CloseGate {
        lane: Lane,
        generation: u64,
        plate: String,
    },
    CompleteExit { vehicle_id: VehicleId },
}

impl DeferredTask {
    fn is_scan(&self) -> bool {
        matches!(
            self,
            DeferredTask::DetectPlate { .. } | DeferredTask::ProcessScan { .. }
        )
    }
}

pub struct ParkingManager {
    config: ParkingConfig,
    fees: FeeSchedule,
    clock: Arc<dyn Clock>,
    vehicles: Vec<VehicleRecord>,
    log: ActivityLog,
    pending: Option<PendingTransaction>,
    gates: Gates,
    scheduler: Scheduler<DeferredTask>,
}

impl ParkingManager {
    pub fn new(config: ParkingConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Self::with_log(config, clock, ActivityLog::default())
    }

    pub fn with_log(
        config: ParkingConfig,
        clock: Arc<dyn Clock>,
        log: ActivityLog,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            fees: config.fee_schedule(),
            config,
            clock,
            vehicles: Vec::new(),
            log,
            pending: None,
            gates: Gates::default(),
            scheduler: Scheduler::new(),
        })
    }

    // ----------------------------
    // Lifecycle operations
    // ----------------------------

    /// Admit a vehicle and open the entrance gate.
    pub fn register_entry(&mut self, raw: &str) -> Result<VehicleRecord, EntryError> {
        let subject = normalize(raw);

        let plate = match Plate::parse(raw) {
            Ok(plate) => plate,
            Err(_) => {
                return self.reject(
                    LogAction::EntryFailed,
                    &subject,
                    EntryError::InvalidPlateFormat(raw.to_string()),
                )
            }
        };

        if self.parked_index(&plate).is_some() {
            return self.reject(
                LogAction::EntryFailed,
                &subject,
                EntryError::AlreadyParked(plate.clone()),
            );
        }

        let now = self.clock.now();
        let close_at = self.deadline_after::<EntryError>(
            now,
            self.config.gate_open(),
            LogAction::EntryFailed,
            &subject,
        )?;
        self.log.record(
            now,
            LogAction::EntrySuccess,
            plate.as_str(),
            "entrance gate opened",
        )?;

        let vehicle = VehicleRecord::parked(plate, now);
        self.vehicles.push(vehicle.clone());
        self.open_gate(Lane::Entrance, vehicle.plate.as_str(), close_at);

        info!(plate = %vehicle.plate, id = %vehicle.id.0, "vehicle entered");
        Ok(vehicle)
    }

    /// Price the stay of a parked vehicle and hold it as the pending exit.
    pub fn register_exit_scan(&mut self, raw: &str) -> Result<PendingTransaction, ExitError> {
        let subject = normalize(raw);

        if let Some(pending) = self.pending.clone() {
            return self.reject(
                LogAction::ExitFailed,
                &subject,
                ExitError::TransactionInProgress(pending.plate),
            );
        }

        let index = Plate::parse(raw)
            .ok()
            .and_then(|plate| self.parked_index(&plate));
        let Some(index) = index else {
            return self.reject(
                LogAction::ExitFailed,
                &subject,
                ExitError::VehicleNotFound(subject.clone()),
            );
        };

        let now = self.clock.now();
        let vehicle = &self.vehicles[index];

        let duration = u64::try_from((now - vehicle.entry_time).num_minutes()).unwrap_or(0);
        let transaction = PendingTransaction {
            vehicle_id: vehicle.id,
            plate: vehicle.plate.clone(),
            entry_time: vehicle.entry_time,
            scanned_at: now,
            duration,
            cost: self.fees.cost_for(duration),
            phase: LifecyclePhase::AwaitingPayment,
        };

        self.log.record(
            now,
            LogAction::ExitScan,
            transaction.plate.as_str(),
            format!("duration: {duration} minutes"),
        )?;
        self.pending = Some(transaction.clone());

        info!(
            plate = %transaction.plate,
            duration,
            cost = transaction.cost,
            "exit scanned"
        );
        Ok(transaction)
    }

    /// Settle the pending exit and schedule its completion.
    pub fn confirm_payment(&mut self) -> Result<PendingTransaction, PaymentError> {
        let Some(mut transaction) = self.pending.clone() else {
            return self.reject(
                LogAction::PaymentFailed,
                SYSTEM_SUBJECT,
                PaymentError::NoPendingTransaction,
            );
        };

        if transaction.is_paid() {
            let plate = transaction.plate.to_string();
            return self.reject(
                LogAction::PaymentFailed,
                &plate,
                PaymentError::AlreadyPaid(transaction.plate),
            );
        }

        let plate = transaction.plate.to_string();
        transaction.phase = match transition(transaction.phase, LifecycleEvent::PaymentConfirmed) {
            Ok(phase) => phase,
            Err(err) => return self.reject(LogAction::PaymentFailed, &plate, err.into()),
        };
        let now = self.clock.now();
        let complete_at = self.deadline_after::<PaymentError>(
            now,
            self.config.payment_processing(),
            LogAction::PaymentFailed,
            &plate,
        )?;

        self.log.record(
            now,
            LogAction::Payment,
            transaction.plate.as_str(),
            format_rupiah(transaction.cost),
        )?;

        if let Some(vehicle) = self
            .vehicles
            .iter_mut()
            .find(|v| v.id == transaction.vehicle_id)
        {
            vehicle.paid = true;
            vehicle.cost = Some(transaction.cost);
        }
        self.pending = Some(transaction.clone());
        self.scheduler.schedule_at(
            complete_at,
            DeferredTask::CompleteExit {
                vehicle_id: transaction.vehicle_id,
            },
        );

        info!(plate = %transaction.plate, cost = transaction.cost, "payment confirmed");
        Ok(transaction)
    }

    /// Release the paid vehicle and open the exit gate.
    pub fn complete_exit(&mut self) -> Result<VehicleRecord, ExitError> {
        let Some(transaction) = self.pending.clone() else {
            return self.reject(
                LogAction::ExitFailed,
                SYSTEM_SUBJECT,
                ExitError::NoPendingTransaction,
            );
        };

        if !transaction.is_paid() {
            let plate = transaction.plate.to_string();
            return self.reject(
                LogAction::ExitFailed,
                &plate,
                ExitError::PaymentOutstanding(transaction.plate),
            );
        }

        let Some(index) = self
            .vehicles
            .iter()
            .position(|v| v.id == transaction.vehicle_id)
        else {
            let plate = transaction.plate.to_string();
            return self.reject(
                LogAction::ExitFailed,
                &plate,
                ExitError::VehicleNotFound(plate.clone()),
            );
        };

        let plate = transaction.plate.to_string();
        let phase = match transition(transaction.phase, LifecycleEvent::ExitCompleted) {
            Ok(phase) => phase,
            Err(err) => return self.reject(LogAction::ExitFailed, &plate, err.into()),
        };
        let now = self.clock.now();
        let close_at = self.deadline_after::<ExitError>(
            now,
            self.config.gate_open(),
            LogAction::ExitFailed,
            &plate,
        )?;

        self.log.record(
            now,
            LogAction::ExitComplete,
            transaction.plate.as_str(),
            "exit gate opened",
        )?;

        let vehicle = &mut self.vehicles[index];
        vehicle.status = phase.status();
        vehicle.exit_time = Some(now);
        let vehicle = vehicle.clone();

        self.pending = None;
        self.open_gate(Lane::Exit, vehicle.plate.as_str(), close_at);

        info!(plate = %vehicle.plate, "vehicle exited");
        Ok(vehicle)
    }

    // ----------------------------
    // Scanning with latency
    // ----------------------------

    /// A plate was read at `lane`; process it after the scan latency.
    pub fn submit_scan(&mut self, lane: Lane, raw: &str) -> Result<(), ScanError> {
        self.ensure_scan_idle(&normalize(raw))?;
        self.detect(lane, raw, &format!("plate detected at {lane} gate"))?;
        Ok(())
    }

    /// An image was uploaded at `lane`; its plate is read after the upload latency.
    pub fn submit_upload(&mut self, lane: Lane, file_name: &str, raw: &str) -> Result<(), ScanError> {
        self.ensure_scan_idle(UPLOAD_SUBJECT)?;

        let now = self.clock.now();
        let detect_at = self.deadline_after::<ScanError>(
            now,
            self.config.upload_latency(),
            LogAction::ScanRejected,
            UPLOAD_SUBJECT,
        )?;
        self.log.record(
            now,
            LogAction::Upload,
            UPLOAD_SUBJECT,
            format!("image {file_name} uploaded"),
        )?;
        self.scheduler.schedule_at(
            detect_at,
            DeferredTask::DetectPlate {
                lane,
                plate: normalize(raw),
                details: format!("plate read from {file_name}"),
            },
        );

        debug!(%lane, file_name, "upload queued");
        Ok(())
    }

    /// Start the scripted demo: the demo plate arrives at the entrance.
    pub fn start_demo(&mut self) -> Result<(), ScanError> {
        self.ensure_scan_idle(SYSTEM_SUBJECT)?;

        let now = self.clock.now();
        let detect_at = self.deadline_after::<ScanError>(
            now,
            self.config.demo_start(),
            LogAction::ScanRejected,
            SYSTEM_SUBJECT,
        )?;
        self.log
            .record(now, LogAction::Demo, SYSTEM_SUBJECT, "demo mode started")?;
        self.scheduler.schedule_at(
            detect_at,
            DeferredTask::DetectPlate {
                lane: Lane::Entrance,
                plate: DEMO_PLATE.to_string(),
                details: "demo plate detected at entrance gate".to_string(),
            },
        );

        info!("demo mode started");
        Ok(())
    }

    /// Fire every deferred task due at the current time.
    pub fn run_due(&mut self) -> Result<Vec<Outcome>, LogError> {
        let mut outcomes = Vec::new();

        loop {
            let due = self.scheduler.take_due(self.clock.now());
            if due.is_empty() {
                break;
            }
            for task in due {
                if let Some(outcome) = self.fire(task)? {
                    outcomes.push(outcome);
                }
            }
        }

        Ok(outcomes)
    }

    // ----------------------------
    // Read-only views
    // ----------------------------

    pub fn stats(&self) -> Stats {
        Stats::derive(&self.vehicles)
    }

    /// All records in insertion order.
    pub fn vehicles(&self) -> &[VehicleRecord] {
        &self.vehicles
    }

    /// Activity entries, newest first.
    pub fn logs(&self) -> Result<Vec<LogEntry>, LogError> {
        self.log.newest_first()
    }

    pub fn activity_log(&self) -> &ActivityLog {
        &self.log
    }

    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    pub fn gate_state(&self, lane: Lane) -> GateState {
        self.gates.state(lane)
    }

    pub fn scan_in_flight(&self) -> bool {
        self.scheduler.any(DeferredTask::is_scan)
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_due()
    }

    pub fn scheduled_tasks(&self) -> usize {
        self.scheduler.len()
    }

    pub fn config(&self) -> &ParkingConfig {
        &self.config
    }

    pub fn snapshot(&self) -> LotSnapshot<'_> {
        LotSnapshot {
            vehicles: &self.vehicles,
            pending: self.pending.as_ref(),
            log: &self.log,
        }
    }

    // ----------------------------
    // Internals
    // ----------------------------

    fn parked_index(&self, plate: &Plate) -> Option<usize> {
        self.vehicles
            .iter()
            .position(|v| v.is_parked() && &v.plate == plate)
    }

    fn open_gate(&mut self, lane: Lane, plate: &str, close_at: DateTime<Utc>) {
        let generation = self.gates.open(lane);
        self.scheduler.schedule_at(
            close_at,
            DeferredTask::CloseGate {
                lane,
                generation,
                plate: plate.to_string(),
            },
        );
    }

    fn ensure_scan_idle(&mut self, subject: &str) -> Result<(), ScanError> {
        if self.scan_in_flight() {
            return self.reject(LogAction::ScanRejected, subject, ScanError::ScanInProgress);
        }
        Ok(())
    }

    fn detect(&mut self, lane: Lane, raw: &str, details: &str) -> Result<String, ScanError> {
        let now = self.clock.now();
        let plate = normalize(raw);
        let process_at = self.deadline_after::<ScanError>(
            now,
            self.config.scan_latency(),
            LogAction::ScanRejected,
            &plate,
        )?;

        self.log.record(now, LogAction::Scan, plate.as_str(), details)?;
        self.scheduler.schedule_at(
            process_at,
            DeferredTask::ProcessScan {
                lane,
                plate: plate.clone(),
            },
        );

        debug!(%lane, %plate, "scan queued");
        Ok(plate)
    }

    fn fire(&mut self, task: DeferredTask) -> Result<Option<Outcome>, LogError> {
        let outcome = match task {
            DeferredTask::DetectPlate {
                lane,
                plate,
                details,
            } => Outcome::from_result(
                Operation::Scan,
                self.detect(lane, &plate, &details),
                |plate| Outcome::ScanQueued { lane, plate },
            )?,
            DeferredTask::ProcessScan {
                lane: Lane::Entrance,
                plate,
            } => Outcome::from_result(Operation::Entry, self.register_entry(&plate), |vehicle| {
                Outcome::Entered { vehicle }
            })?,
            DeferredTask::ProcessScan {
                lane: Lane::Exit,
                plate,
            } => Outcome::from_result(
                Operation::ExitScan,
                self.register_exit_scan(&plate),
                |transaction| Outcome::ExitScanned { transaction },
            )?,
            DeferredTask::CloseGate {
                lane,
                generation,
                plate,
            } => {
                if !self.gates.close(lane, generation) {
                    debug!(%lane, generation, "stale gate close skipped");
                    return Ok(None);
                }
                self.log.record(
                    self.clock.now(),
                    LogAction::GateClosed,
                    plate,
                    format!("{lane} gate closed"),
                )?;
                Outcome::GateClosed { lane }
            }
            DeferredTask::CompleteExit { vehicle_id } => {
                let settled = self
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.vehicle_id == vehicle_id && p.is_paid());
                if !settled {
                    debug!(id = %vehicle_id.0, "exit already completed");
                    return Ok(None);
                }
                Outcome::from_result(Operation::CompleteExit, self.complete_exit(), |vehicle| {
                    Outcome::ExitCompleted { vehicle }
                })?
            }
        };

        Ok(Some(outcome))
    }

    /// Deadline for a deferred task, checked before any state is touched.
    fn deadline_after<E>(
        &mut self,
        now: DateTime<Utc>,
        delay: Duration,
        action: LogAction,
        subject: &str,
    ) -> Result<DateTime<Utc>, E>
    where
        E: std::fmt::Display + From<LogError> + From<DeadlineOverflow>,
    {
        match deadline(now, delay) {
            Ok(at) => Ok(at),
            Err(err) => self.reject(action, subject, err.into()),
        }
    }

    fn reject<T, E>(&mut self, action: LogAction, subject: &str, err: E) -> Result<T, E>
    where
        E: std::fmt::Display + From<LogError>,
    {
        warn!(?action, subject, error = %err, "operation rejected");
        self.log
            .record(self.clock.now(), action, subject, err.to_string())?;
        Err(err)
    }
}
