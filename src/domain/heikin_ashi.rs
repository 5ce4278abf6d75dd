//! Heikin-Ashi candle transform and its reversal signal.
//!
//! HA_close[i] = (O + H + L + C) / 4
//! HA_open[0]  = O[0]
//! HA_open[i]  = HA_close[i-1]
//! HA_high[i]  = max(H, HA_open, HA_close)
//! HA_low[i]   = min(L, HA_open, HA_close)

use crate::domain::ohlcv::Candle;
use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct HeikinAshiCandle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl HeikinAshiCandle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

pub fn heikin_ashi(candles: &[Candle]) -> Vec<HeikinAshiCandle> {
    let mut out: Vec<HeikinAshiCandle> = Vec::with_capacity(candles.len());

    for candle in candles {
        let close = candle.ohlc4();
        let open = match out.last() {
            Some(prev) => prev.close,
            None => candle.open,
        };
        out.push(HeikinAshiCandle {
            timestamp: candle.timestamp,
            open,
            high: candle.high.max(open).max(close),
            low: candle.low.min(open).min(close),
            close,
        });
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeikinAshiSignal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for HeikinAshiSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeikinAshiSignal::Buy => write!(f, "buy"),
            HeikinAshiSignal::Sell => write!(f, "sell"),
            HeikinAshiSignal::Hold => write!(f, "hold"),
        }
    }
}

/// Buy when the latest HA candle turns bullish, Sell when it turns bearish.
pub fn heikin_ashi_signal(candles: &[Candle]) -> HeikinAshiSignal {
    let ha = heikin_ashi(candles);
    if ha.len() < 2 {
        return HeikinAshiSignal::Hold;
    }
    let last = &ha[ha.len() - 1];
    let prev = &ha[ha.len() - 2];

    if last.close > last.open && prev.close <= prev.open {
        HeikinAshiSignal::Buy
    } else if last.close < last.open && prev.close >= prev.open {
        HeikinAshiSignal::Sell
    } else {
        HeikinAshiSignal::Hold
    }
}
