// MallPark Kernel
//
// Vehicle lifecycle core for an automated mall parking terminal:
// entry, exit scan, payment and exit, with an auditable activity log.

pub mod clock;
pub mod config;
pub mod fee;
pub mod gate;
pub mod invariants;
pub mod log;
pub mod manager;
pub mod plate;
pub mod replay;
pub mod schedule;
pub mod simulate;
pub mod source;
pub mod state;

pub use manager::{EntryError, ExitError, Outcome, ParkingManager, PaymentError, ScanError};
