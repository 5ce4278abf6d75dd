//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) candles are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Candle;

pub fn calculate_ema(candles: &[Candle], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let raw = ema_values(&closes, period);

    let values = candles
        .iter()
        .zip(raw)
        .map(|(candle, ema)| IndicatorPoint {
            timestamp: candle.timestamp,
            valid: ema.is_some(),
            value: IndicatorValue::Simple(ema.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        required: period.max(1),
        values,
    }
}

/// EMA over an arbitrary input slice; `None` during warmup.
pub(crate) fn ema_values(input: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = Vec::with_capacity(input.len());
    if period == 0 {
        values.resize(input.len(), None);
        return values;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &x) in input.iter().enumerate() {
        if i < period - 1 {
            sum += x;
            values.push(None);
        } else if i == period - 1 {
            sum += x;
            ema = sum / period as f64;
            values.push(Some(ema));
        } else {
            ema = x * k + ema * (1.0 - k);
            values.push(Some(ema));
        }
    }

    values
}
