//! Instrument universe for one decision cycle.
//!
//! Parses instrument lists from configuration and combines the scan list
//! with the current holdings.

use crate::domain::portfolio::Holdings;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    /// Scan order.
    pub instruments: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in instrument list")]
    EmptyToken,

    #[error("duplicate instrument: {0}")]
    DuplicateInstrument(String),
}

/// Splits a comma-separated list, trimming and uppercasing each entry.
pub fn parse_instruments(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut instruments = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let instrument = trimmed.to_uppercase();
        if !seen.insert(instrument.clone()) {
            return Err(UniverseError::DuplicateInstrument(instrument));
        }
        instruments.push(instrument);
    }

    Ok(instruments)
}

/// Scan list minus exclusions, then every held instrument not already
/// listed. Held instruments are kept even when excluded so their exits are
/// still evaluated.
pub fn build_universe(listed: &[String], excluded: &[String], holdings: &Holdings) -> Universe {
    let mut seen = HashSet::new();
    let mut instruments = Vec::new();

    for instrument in listed {
        if excluded.contains(instrument) && !holdings.has_position(instrument) {
            continue;
        }
        if seen.insert(instrument.as_str()) {
            instruments.push(instrument.clone());
        }
    }
    for held in holdings.instruments() {
        if seen.insert(held) {
            instruments.push(held.to_string());
        }
    }

    Universe { instruments }
}
