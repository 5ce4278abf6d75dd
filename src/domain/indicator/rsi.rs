//! RSI (Relative Strength Index) indicator.
//!
//! Uses simple rolling means of the last n close-to-close changes:
//! - avg_gain = mean(max(delta, 0)), avg_loss = mean(max(-delta, 0))
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n candles are invalid (need n price changes).

use crate::domain::indicator::{
    IndicatorPoint, IndicatorResult, IndicatorSeries, IndicatorType, IndicatorValue,
};
use crate::domain::ohlcv::Candle;

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_rsi(candles: &[Candle], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());

    let mut gains: Vec<f64> = Vec::with_capacity(candles.len());
    let mut losses: Vec<f64> = Vec::with_capacity(candles.len());
    for i in 1..candles.len() {
        let change = candles[i].close - candles[i - 1].close;
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    for (i, candle) in candles.iter().enumerate() {
        if period == 0 || i < period {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
            continue;
        }

        // deltas[i - period .. i] are the changes into candles i-period+1 ..= i
        let window = (i - period)..i;
        let avg_gain = gains[window.clone()].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[window].iter().sum::<f64>() / period as f64;

        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid: true,
            value: IndicatorValue::Simple(rsi_from_averages(avg_gain, avg_loss)),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        required: period + 1,
        values,
    }
}

/// Latest RSI value.
pub fn rsi(candles: &[Candle], period: usize) -> IndicatorResult<f64> {
    calculate_rsi(candles, period).latest_simple()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}
