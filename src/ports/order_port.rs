//! Order placement port trait.

use crate::domain::error::ExecutionFailure;
use crate::domain::execution::Fill;

pub trait OrderPort {
    /// Market buy spending `notional` of the cash asset.
    fn place_buy(&self, instrument: &str, notional: f64) -> Result<Fill, ExecutionFailure>;

    /// Market sell of `quantity` units.
    fn place_sell(&self, instrument: &str, quantity: f64) -> Result<Fill, ExecutionFailure>;
}
