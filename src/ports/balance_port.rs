//! Account balance port trait.

use crate::domain::error::SignalError;
use crate::domain::position::BalanceEntry;

pub trait BalancePort {
    /// Current balances including the cash asset. Side-effect free.
    fn read_balances(&self) -> Result<Vec<BalanceEntry>, SignalError>;
}
