// Gate Signals
//
// Cosmetic open/closed state for the entrance and exit barriers.
// Gate state follows the data-model transitions but never gates them.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Entrance,
    Exit,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Entrance => f.write_str("entrance"),
            Lane::Exit => f.write_str("exit"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    Open,
    Closed,
}

/// A single barrier.
///
/// Every open bumps `generation`; a close request carries the generation
/// it was issued for and is ignored once the gate has been reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    state: GateState,
    generation: u64,
}

impl Gate {
    fn new() -> Self {
        Self {
            state: GateState::Closed,
            generation: 0,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    fn open(&mut self) -> u64 {
        self.generation += 1;
        self.state = GateState::Open;
        self.generation
    }

    fn close(&mut self, generation: u64) -> bool {
        if self.generation != generation || self.state == GateState::Closed {
            return false;
        }
        self.state = GateState::Closed;
        true
    }
}

/// Both barriers of the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gates {
    entrance: Gate,
    exit: Gate,
}

impl Default for Gates {
    fn default() -> Self {
        Self {
            entrance: Gate::new(),
            exit: Gate::new(),
        }
    }
}

impl Gates {
    pub fn state(&self, lane: Lane) -> GateState {
        self.gate(lane).state()
    }

    /// Open a gate and return the generation a later close must match.
    pub fn open(&mut self, lane: Lane) -> u64 {
        self.gate_mut(lane).open()
    }

    /// Close a gate if it is still on `generation`. Returns whether it closed.
    pub fn close(&mut self, lane: Lane, generation: u64) -> bool {
        self.gate_mut(lane).close(generation)
    }

    fn gate(&self, lane: Lane) -> &Gate {
        match lane {
            Lane::Entrance => &self.entrance,
            Lane::Exit => &self.exit,
        }
    }

    fn gate_mut(&mut self, lane: Lane) -> &mut Gate {
        match lane {
            Lane::Entrance => &mut self.entrance,
            Lane::Exit => &mut self.exit,
        }
    }
}
