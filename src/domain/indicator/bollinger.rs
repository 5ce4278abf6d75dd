//! Bollinger Bands indicator.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is the sample standard deviation (divides by N-1).
//!
//! Default parameters: period=20, multiplier=2.0
//! Warmup: first (period-1) candles are invalid.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorResult, IndicatorSeries, IndicatorType, IndicatorValue,
    UndefinedReason,
};
use crate::domain::ohlcv::Candle;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    candles: &[Candle],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());
    let mult = stddev_mult_x100 as f64 / 100.0;

    for i in 0..candles.len() {
        let timestamp = candles[i].timestamp;
        // The sample deviation needs at least two closes.
        let valid = period >= 2 && i + 1 >= period;

        let (upper, middle, lower) = if valid {
            let window = &candles[i + 1 - period..=i];

            let middle_val: f64 = window.iter().map(|c| c.close).sum::<f64>() / period as f64;

            let variance: f64 = window
                .iter()
                .map(|c| {
                    let diff = c.close - middle_val;
                    diff * diff
                })
                .sum::<f64>()
                / (period - 1) as f64;

            let stddev = variance.sqrt();
            (middle_val + mult * stddev, middle_val, middle_val - mult * stddev)
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            timestamp,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        required: period.max(2),
        values,
    }
}

/// Where the latest close sits inside the band: 0 at the lower band, 1 at the upper.
pub fn bollinger_position(
    candles: &[Candle],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorResult<f64> {
    let series = calculate_bollinger(candles, period, stddev_mult_x100);
    let (upper, lower) = match series.latest() {
        IndicatorResult::Defined(IndicatorValue::Bollinger { upper, lower, .. }) => (upper, lower),
        IndicatorResult::Defined(_) => {
            return IndicatorResult::insufficient(series.required, candles.len());
        }
        IndicatorResult::Undefined(reason) => return IndicatorResult::Undefined(reason),
    };

    let width = upper - lower;
    if width <= 0.0 {
        return IndicatorResult::Undefined(UndefinedReason::ZeroBandWidth);
    }
    // latest() was Defined, so there is a last candle.
    let close = candles[candles.len() - 1].close;
    IndicatorResult::Defined((close - lower) / width)
}
