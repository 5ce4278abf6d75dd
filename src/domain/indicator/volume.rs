//! Volume surge ratio.
//!
//! ratio = V[last] / mean(V[last-n..last]), i.e. the current volume against the
//! n volumes before it. A non-positive trailing mean yields 0.

use crate::domain::indicator::IndicatorResult;
use crate::domain::ohlcv::Candle;

pub const DEFAULT_WINDOW: usize = 20;

pub fn volume_ratio(candles: &[Candle], window: usize) -> IndicatorResult<f64> {
    let required = window + 1;
    if window == 0 || candles.len() < required {
        return IndicatorResult::insufficient(required.max(2), candles.len());
    }

    let last = candles.len() - 1;
    let trailing = &candles[last - window..last];
    let mean = trailing.iter().map(|c| c.volume).sum::<f64>() / window as f64;

    if mean <= 0.0 {
        return IndicatorResult::Defined(0.0);
    }
    IndicatorResult::Defined(candles[last].volume / mean)
}
