//! Market data port trait.

use crate::domain::error::FetchError;
use crate::domain::ohlcv::{Candle, CandleInterval};

pub trait MarketDataPort {
    /// The latest `count` candles, oldest first. An empty vector is a valid
    /// answer; callers treat it like [`FetchError::Unavailable`].
    fn fetch_candles(
        &self,
        instrument: &str,
        count: usize,
        interval: CandleInterval,
    ) -> Result<Vec<Candle>, FetchError>;

    fn list_instruments(&self) -> Result<Vec<String>, FetchError>;
}
