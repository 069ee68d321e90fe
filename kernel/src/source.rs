// Plate Sources
//
// Stand-ins for the lane camera. The manager only consumes the string a
// source produces; recognition itself is out of scope.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Plates the simulated OCR draws from.
pub const SAMPLE_PLATES: [&str; 6] = [
    "B1234ABC", "D5678XYZ", "B9999KLM", "D1111PQR", "B8888TUV", "D3333MNO",
];

pub trait PlateSource: Send {
    /// Read the next plate, or `None` if nothing was recognized.
    fn read_plate(&mut self) -> Option<String>;
}

/// Random draws from [`SAMPLE_PLATES`].
#[derive(Debug, Clone)]
pub struct RandomPlateSource {
    rng: StdRng,
}

impl RandomPlateSource {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPlateSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PlateSource for RandomPlateSource {
    fn read_plate(&mut self) -> Option<String> {
        SAMPLE_PLATES.choose(&mut self.rng).map(|p| p.to_string())
    }
}

/// Replays a fixed list of readings, then reports nothing.
#[derive(Debug, Clone, Default)]
pub struct SequencePlateSource {
    plates: VecDeque<String>,
}

impl SequencePlateSource {
    pub fn new<I, S>(plates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            plates: plates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.plates.len()
    }
}

impl PlateSource for SequencePlateSource {
    fn read_plate(&mut self) -> Option<String> {
        self.plates.pop_front()
    }
}
