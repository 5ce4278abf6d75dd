//! Cash and held positions, rebuilt from a balance read every cycle.

use super::error::SignalError;
use super::position::{BalanceEntry, Position, SlotState};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Holdings {
    pub cash: f64,
    /// Balance-read order.
    pub positions: Vec<Position>,
}

impl Holdings {
    pub fn new(cash: f64) -> Self {
        Holdings {
            cash,
            positions: Vec::new(),
        }
    }

    /// Builds holdings from raw balance rows. The row named `cash_asset`
    /// supplies the cash amount; zero-quantity rows are dropped. Negative or
    /// non-finite amounts and repeated instruments are rejected.
    pub fn from_balances(entries: &[BalanceEntry], cash_asset: &str) -> Result<Self, SignalError> {
        let mut holdings = Holdings::default();
        let mut cash_seen = false;

        for entry in entries {
            if !entry.quantity.is_finite() || entry.quantity < 0.0 {
                return Err(invalid(entry, format!("quantity {}", entry.quantity)));
            }

            if entry.instrument == cash_asset {
                if cash_seen {
                    return Err(invalid(entry, "duplicate cash entry".to_string()));
                }
                cash_seen = true;
                holdings.cash = entry.quantity;
                continue;
            }

            if !entry.entry_price.is_finite() || entry.entry_price < 0.0 {
                return Err(invalid(entry, format!("entry price {}", entry.entry_price)));
            }
            if holdings.has_position(&entry.instrument) {
                return Err(invalid(entry, "duplicate instrument".to_string()));
            }
            if entry.quantity == 0.0 {
                continue;
            }
            holdings.add_position(Position {
                instrument: entry.instrument.clone(),
                entry_price: entry.entry_price,
                quantity: entry.quantity,
            });
        }

        Ok(holdings)
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.push(position);
    }

    pub fn get_position(&self, instrument: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.instrument == instrument)
    }

    pub fn has_position(&self, instrument: &str) -> bool {
        self.get_position(instrument).is_some()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn slot_state(&self, instrument: &str) -> SlotState {
        SlotState::from(self.get_position(instrument))
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.positions.iter().map(|p| p.instrument.as_str())
    }
}

fn invalid(entry: &BalanceEntry, reason: String) -> SignalError {
    SignalError::InvalidBalance {
        instrument: entry.instrument.clone(),
        reason,
    }
}
