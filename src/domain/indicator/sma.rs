//! Simple Moving Average and the short/long moving-average trend.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) candles are invalid.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorResult, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::Candle;

pub fn calculate_sma(candles: &[Candle], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        sum += candle.close;
        if period > 0 && i >= period {
            sum -= candles[i - period].close;
        }
        let valid = period > 0 && i + 1 >= period;
        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid,
            value: IndicatorValue::Simple(if valid { sum / period as f64 } else { 0.0 }),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        required: period.max(1),
        values,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaTrend {
    pub short_ma: f64,
    pub long_ma: f64,
}

impl MaTrend {
    pub fn is_up(&self) -> bool {
        self.short_ma > self.long_ma
    }
}

/// Latest short vs long SMA of close.
pub fn ma_trend(candles: &[Candle], short: usize, long: usize) -> IndicatorResult<MaTrend> {
    let short_ma = calculate_sma(candles, short).latest_simple();
    let long_ma = calculate_sma(candles, long).latest_simple();
    match (short_ma, long_ma) {
        (IndicatorResult::Defined(short_ma), IndicatorResult::Defined(long_ma)) => {
            IndicatorResult::Defined(MaTrend { short_ma, long_ma })
        }
        (IndicatorResult::Undefined(reason), _) | (_, IndicatorResult::Undefined(reason)) => {
            IndicatorResult::Undefined(reason)
        }
    }
}
