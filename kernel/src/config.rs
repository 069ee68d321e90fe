// Terminal Configuration
//
// Tariff and timing knobs, loaded from JSON. Every field is optional;
// missing fields fall back to the built-in defaults.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::fee::{Amount, FeeSchedule};

/// Upper bound on the base rate, in rupiah.
pub const MAX_BASE_RATE: Amount = 1_000_000_000;

/// Upper bound on any configured delay: one day.
pub const MAX_DELAY_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base rate must be greater than zero")]
    ZeroBaseRate,

    #[error("billing block must be at least one minute")]
    ZeroBillingBlock,

    #[error("base rate {0} exceeds the maximum of {MAX_BASE_RATE}")]
    BaseRateTooHigh(Amount),

    #[error("{field} of {ms} ms exceeds the maximum of {MAX_DELAY_MS} ms")]
    DelayOutOfRange { field: &'static str, ms: u64 },

    #[error("invalid config: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkingConfig {
    pub base_rate: Amount,
    pub billing_block_minutes: u64,
    pub gate_open_ms: u64,
    pub scan_latency_ms: u64,
    pub upload_latency_ms: u64,
    pub payment_processing_ms: u64,
    pub demo_start_ms: u64,
}

impl Default for ParkingConfig {
    fn default() -> Self {
        Self {
            base_rate: 3000,
            billing_block_minutes: 60,
            gate_open_ms: 3000,
            scan_latency_ms: 1500,
            upload_latency_ms: 1000,
            payment_processing_ms: 2000,
            demo_start_ms: 1000,
        }
    }
}

impl ParkingConfig {
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(data).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_rate == 0 {
            return Err(ConfigError::ZeroBaseRate);
        }
        if self.billing_block_minutes == 0 {
            return Err(ConfigError::ZeroBillingBlock);
        }
        if self.base_rate > MAX_BASE_RATE {
            return Err(ConfigError::BaseRateTooHigh(self.base_rate));
        }

        let delays = [
            ("gate_open_ms", self.gate_open_ms),
            ("scan_latency_ms", self.scan_latency_ms),
            ("upload_latency_ms", self.upload_latency_ms),
            ("payment_processing_ms", self.payment_processing_ms),
            ("demo_start_ms", self.demo_start_ms),
        ];
        if let Some((field, ms)) = delays.into_iter().find(|(_, ms)| *ms > MAX_DELAY_MS) {
            return Err(ConfigError::DelayOutOfRange { field, ms });
        }
        Ok(())
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            base_rate: self.base_rate,
            block_minutes: self.billing_block_minutes,
        }
    }

    pub fn gate_open(&self) -> Duration {
        millis(self.gate_open_ms)
    }

    pub fn scan_latency(&self) -> Duration {
        millis(self.scan_latency_ms)
    }

    pub fn upload_latency(&self) -> Duration {
        millis(self.upload_latency_ms)
    }

    pub fn payment_processing(&self) -> Duration {
        millis(self.payment_processing_ms)
    }

    pub fn demo_start(&self) -> Duration {
        millis(self.demo_start_ms)
    }
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(ms.min(MAX_DELAY_MS) as i64)
}
