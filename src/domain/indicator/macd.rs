//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: slow - 1 + signal - 1 candles.

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{
    IndicatorPoint, IndicatorResult, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::Candle;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    let required = slow.max(fast) + signal_period.saturating_sub(1);

    if fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type,
            required: required.max(1),
            values: candles
                .iter()
                .map(|c| IndicatorPoint {
                    timestamp: c.timestamp,
                    valid: false,
                    value: IndicatorValue::Macd {
                        line: 0.0,
                        signal: 0.0,
                        histogram: 0.0,
                    },
                })
                .collect(),
        };
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // The signal EMA runs over the defined part of the MACD line only.
    let first_defined = macd_line.iter().position(Option::is_some);
    let mut signal_line: Vec<Option<f64>> = vec![None; candles.len()];
    if let Some(start) = first_defined {
        let defined: Vec<f64> = macd_line[start..].iter().map(|v| v.unwrap_or(0.0)).collect();
        for (offset, value) in ema_values(&defined, signal_period).into_iter().enumerate() {
            signal_line[start + offset] = value;
        }
    }

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| match (macd_line[i], signal_line[i]) {
            (Some(line), Some(signal)) => IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            },
            (line, _) => IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Macd {
                    line: line.unwrap_or(0.0),
                    signal: 0.0,
                    histogram: 0.0,
                },
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        required,
        values,
    }
}

pub fn calculate_macd_default(candles: &[Candle]) -> IndicatorSeries {
    calculate_macd(candles, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdCrossover {
    Bullish,
    Bearish,
    None,
}

/// Histogram sign change between the last two candles.
pub fn macd_crossover(series: &IndicatorSeries) -> IndicatorResult<MacdCrossover> {
    let histogram = |back| {
        series.from_end(back).map(|value| match value {
            IndicatorValue::Macd { histogram, .. } => histogram,
            _ => 0.0,
        })
    };

    let (current, previous) = match (histogram(0), histogram(1)) {
        (IndicatorResult::Defined(c), IndicatorResult::Defined(p)) => (c, p),
        (IndicatorResult::Undefined(reason), _) | (_, IndicatorResult::Undefined(reason)) => {
            return IndicatorResult::Undefined(reason);
        }
    };

    let crossover = if current > 0.0 && previous <= 0.0 {
        MacdCrossover::Bullish
    } else if current < 0.0 && previous >= 0.0 {
        MacdCrossover::Bearish
    } else {
        MacdCrossover::None
    };
    IndicatorResult::Defined(crossover)
}
