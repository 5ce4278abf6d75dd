//! OHLCV candle representation.

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// (open + high + low + close) / 4
    pub fn ohlc4(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }

    /// close × volume
    pub fn traded_value(&self) -> f64 {
        self.close * self.volume
    }
}

/// Closing prices, oldest first.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Candle width requested from the market-data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleInterval {
    Minutes(u32),
    Day,
    Week,
}

pub const SUPPORTED_MINUTES: [u32; 8] = [1, 3, 5, 10, 15, 30, 60, 240];

impl Default for CandleInterval {
    fn default() -> Self {
        CandleInterval::Minutes(1)
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandleInterval::Minutes(m) => write!(f, "minute{m}"),
            CandleInterval::Day => write!(f, "day"),
            CandleInterval::Week => write!(f, "week"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown candle interval '{0}' (expected minute1..minute240, day or week)")]
pub struct ParseIntervalError(pub String);

impl FromStr for CandleInterval {
    type Err = ParseIntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "day" | "days" => return Ok(CandleInterval::Day),
            "week" | "weeks" => return Ok(CandleInterval::Week),
            _ => {}
        }
        lower
            .strip_prefix("minute")
            .and_then(|m| m.strip_suffix('s').unwrap_or(m).parse::<u32>().ok())
            .filter(|m| SUPPORTED_MINUTES.contains(m))
            .map(CandleInterval::Minutes)
            .ok_or_else(|| ParseIntervalError(s.to_string()))
    }
}
