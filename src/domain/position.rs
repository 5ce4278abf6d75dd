//! Held positions as reported by the balance source.

/// One row of a balance read. The cash asset appears here too, with its
/// amount in `quantity`.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceEntry {
    pub instrument: String,
    pub quantity: f64,
    pub entry_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub instrument: String,
    pub entry_price: f64,
    pub quantity: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }

    /// `(price - entry) / entry`; `None` without a positive entry price.
    pub fn profit_ratio(&self, price: f64) -> Option<f64> {
        if self.entry_price <= 0.0 {
            return None;
        }
        Some((price - self.entry_price) / self.entry_price)
    }
}

/// Per-instrument lifecycle state, rederived from balances every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotState {
    Flat,
    Held { entry_price: f64, quantity: f64 },
}

impl SlotState {
    pub fn is_held(&self) -> bool {
        matches!(self, SlotState::Held { .. })
    }
}

impl From<Option<&Position>> for SlotState {
    fn from(position: Option<&Position>) -> Self {
        match position {
            Some(p) => SlotState::Held {
                entry_price: p.entry_price,
                quantity: p.quantity,
            },
            None => SlotState::Flat,
        }
    }
}
