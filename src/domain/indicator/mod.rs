//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A trailing series of indicator values
//! - `IndicatorResult`: The latest value of an indicator, or why there is none
//!
//! Every calculation is a pure function of the candle slice. Short history is
//! reported as [`IndicatorResult::Undefined`], never as a silent zero.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod volume;

pub use bollinger::{bollinger_position, calculate_bollinger};
pub use ema::calculate_ema;
pub use macd::{calculate_macd, macd_crossover, MacdCrossover};
pub use rsi::{calculate_rsi, rsi};
pub use sma::{calculate_sma, ma_trend, MaTrend};
pub use volume::volume_ratio;

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

impl IndicatorValue {
    /// The scalar for `Simple` points; `None` for the composite shapes.
    pub fn as_simple(&self) -> Option<f64> {
        match self {
            IndicatorValue::Simple(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    MaTrend {
        short: usize,
        long: usize,
    },
    VolumeRatio(usize),
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::MaTrend { short, long } => write!(f, "MA_TREND({},{})", short, long),
            IndicatorType::VolumeRatio(window) => write!(f, "VOLUME_RATIO({})", window),
        }
    }
}

/// Why an indicator has no value for the latest candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndefinedReason {
    InsufficientHistory { required: usize, available: usize },
    ZeroBandWidth,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndefinedReason::InsufficientHistory {
                required,
                available,
            } => write!(f, "insufficient history ({available} of {required} candles)"),
            UndefinedReason::ZeroBandWidth => write!(f, "zero band width"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorResult<T> {
    Defined(T),
    Undefined(UndefinedReason),
}

impl<T> IndicatorResult<T> {
    pub fn is_defined(&self) -> bool {
        matches!(self, IndicatorResult::Defined(_))
    }

    pub fn defined(self) -> Option<T> {
        match self {
            IndicatorResult::Defined(v) => Some(v),
            IndicatorResult::Undefined(_) => None,
        }
    }

    pub fn undefined_reason(&self) -> Option<UndefinedReason> {
        match self {
            IndicatorResult::Defined(_) => None,
            IndicatorResult::Undefined(reason) => Some(*reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> IndicatorResult<U> {
        match self {
            IndicatorResult::Defined(v) => IndicatorResult::Defined(f(v)),
            IndicatorResult::Undefined(reason) => IndicatorResult::Undefined(reason),
        }
    }

    pub(crate) fn insufficient(required: usize, available: usize) -> Self {
        IndicatorResult::Undefined(UndefinedReason::InsufficientHistory {
            required,
            available,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    /// Candles needed before the first valid point.
    pub required: usize,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn latest(&self) -> IndicatorResult<IndicatorValue> {
        self.from_end(0)
    }

    /// The point `back` candles before the latest one.
    pub fn from_end(&self, back: usize) -> IndicatorResult<IndicatorValue> {
        let available = self.values.len();
        if back >= available {
            return IndicatorResult::insufficient(self.required + back, available);
        }
        let point = &self.values[available - 1 - back];
        if point.valid {
            IndicatorResult::Defined(point.value)
        } else {
            IndicatorResult::insufficient(self.required + back, available)
        }
    }

    pub fn latest_simple(&self) -> IndicatorResult<f64> {
        match self.latest() {
            IndicatorResult::Defined(IndicatorValue::Simple(v)) => IndicatorResult::Defined(v),
            IndicatorResult::Defined(_) => {
                IndicatorResult::insufficient(self.required, self.values.len())
            }
            IndicatorResult::Undefined(reason) => IndicatorResult::Undefined(reason),
        }
    }
}
