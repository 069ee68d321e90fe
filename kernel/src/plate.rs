// License Plate Grammar
//
// Normalizes raw plate strings (from OCR, uploads or manual input)
// and validates them against the regional plate grammar:
// 1-2 letters, 1-4 digits, 1-3 letters.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const PLATE_PATTERN: &str = r"^[A-Z]{1,2}[0-9]{1,4}[A-Z]{1,3}$";

fn plate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLATE_PATTERN).expect("plate pattern is a valid regex"))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlateError {
    #[error("invalid plate format: {0:?}")]
    InvalidFormat(String),
}

/// A validated, normalized license plate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Plate(String);

impl Plate {
    /// Parse a raw plate string.
    ///
    /// Whitespace is dropped and letters are uppercased before matching,
    /// so `"b 1234 abc"` parses as `B1234ABC`.
    pub fn parse(raw: &str) -> Result<Self, PlateError> {
        let normalized = normalize(raw);

        if plate_regex().is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(PlateError::InvalidFormat(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Strip whitespace and uppercase ASCII letters.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Plate {
    type Error = PlateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Plate::parse(&value)
    }
}

impl From<Plate> for String {
    fn from(plate: Plate) -> Self {
        plate.0
    }
}
