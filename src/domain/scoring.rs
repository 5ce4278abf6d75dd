//! Multi-factor composite score.
//!
//! Each factor (RSI, MACD crossover, Bollinger position, MA trend) maps to a
//! signed delta from a [`ScoreTable`]. Deltas are summed and clamped to
//! `[0, 100]`. If any factor's indicator is undefined the outcome is
//! [`ScoreOutcome::InsufficientData`], never a low score.

use crate::domain::indicator::{
    bollinger, calculate_macd, macd, macd_crossover, ma_trend, rsi, volume, IndicatorResult,
    IndicatorType, MaTrend, MacdCrossover, UndefinedReason,
};
use crate::domain::ohlcv::Candle;
use std::fmt;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Periods for every indicator the engine computes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_mult_x100: u32,
    pub ma_short: usize,
    pub ma_long: usize,
    pub volume_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: rsi::DEFAULT_PERIOD,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
            bollinger_period: bollinger::DEFAULT_PERIOD,
            bollinger_mult_x100: bollinger::DEFAULT_MULT_X100,
            ma_short: 5,
            ma_long: 20,
            volume_window: volume::DEFAULT_WINDOW,
        }
    }
}

impl IndicatorParams {
    pub fn rsi_type(&self) -> IndicatorType {
        IndicatorType::Rsi(self.rsi_period)
    }

    pub fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            fast: self.macd_fast,
            slow: self.macd_slow,
            signal: self.macd_signal,
        }
    }

    pub fn bollinger_type(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.bollinger_period,
            stddev_mult_x100: self.bollinger_mult_x100,
        }
    }

    pub fn trend_type(&self) -> IndicatorType {
        IndicatorType::MaTrend {
            short: self.ma_short,
            long: self.ma_long,
        }
    }
}

/// Thresholds and point deltas for each factor.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreTable {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold_delta: f64,
    pub rsi_overbought_delta: f64,
    pub rsi_neutral_delta: f64,
    pub macd_bullish_delta: f64,
    pub macd_bearish_delta: f64,
    pub macd_flat_delta: f64,
    pub bollinger_low: f64,
    pub bollinger_high: f64,
    pub bollinger_low_delta: f64,
    pub bollinger_high_delta: f64,
    pub bollinger_mid_delta: f64,
    pub trend_up_delta: f64,
    pub trend_down_delta: f64,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            rsi_oversold_delta: 25.0,
            rsi_overbought_delta: -15.0,
            rsi_neutral_delta: 10.0,
            macd_bullish_delta: 20.0,
            macd_bearish_delta: -15.0,
            macd_flat_delta: 0.0,
            bollinger_low: 0.2,
            bollinger_high: 0.8,
            bollinger_low_delta: 15.0,
            bollinger_high_delta: -10.0,
            bollinger_mid_delta: 0.0,
            trend_up_delta: 15.0,
            trend_down_delta: -10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Factor {
    Rsi,
    Macd,
    Bollinger,
    MaTrend,
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factor::Rsi => write!(f, "RSI"),
            Factor::Macd => write!(f, "MACD"),
            Factor::Bollinger => write!(f, "Bollinger"),
            Factor::MaTrend => write!(f, "MA trend"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Oversold,
    Overbought,
    Neutral,
    BullishCrossover,
    BearishCrossover,
    NoCrossover,
    NearLowerBand,
    NearUpperBand,
    InsideBand,
    TrendUp,
    TrendDown,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Condition::Oversold => "oversold",
            Condition::Overbought => "overbought",
            Condition::Neutral => "neutral",
            Condition::BullishCrossover => "bullish crossover",
            Condition::BearishCrossover => "bearish crossover",
            Condition::NoCrossover => "no crossover",
            Condition::NearLowerBand => "near lower band",
            Condition::NearUpperBand => "near upper band",
            Condition::InsideBand => "inside band",
            Condition::TrendUp => "up",
            Condition::TrendDown => "down",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorScore {
    pub factor: Factor,
    pub condition: Condition,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    /// In evaluation order: RSI, MACD, Bollinger, MA trend.
    pub factors: Vec<FactorScore>,
    /// Unclamped sum of the deltas.
    pub raw_total: f64,
    pub total: f64,
}

impl fmt::Display for ScoreBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "score {:.0} (", self.total)?;
        for (i, item) in self.factors.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {} {:+.0}", item.factor, item.condition, item.delta)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissingIndicator {
    pub indicator: IndicatorType,
    pub reason: UndefinedReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Scored(ScoreBreakdown),
    InsufficientData { missing: Vec<MissingIndicator> },
}

impl ScoreOutcome {
    /// The clamped total; 0 for insufficient data.
    pub fn score(&self) -> f64 {
        match self {
            ScoreOutcome::Scored(breakdown) => breakdown.total,
            ScoreOutcome::InsufficientData { .. } => 0.0,
        }
    }

    pub fn breakdown(&self) -> Option<&ScoreBreakdown> {
        match self {
            ScoreOutcome::Scored(breakdown) => Some(breakdown),
            ScoreOutcome::InsufficientData { .. } => None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, ScoreOutcome::InsufficientData { .. })
    }
}

impl fmt::Display for ScoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreOutcome::Scored(breakdown) => write!(f, "{breakdown}"),
            ScoreOutcome::InsufficientData { missing } => {
                write!(f, "insufficient data (")?;
                for (i, m) in missing.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", m.indicator, m.reason)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// The four indicator readings the table is applied to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorReadings {
    pub rsi: f64,
    pub macd: MacdCrossover,
    pub bollinger_position: f64,
    pub trend: MaTrend,
}

pub fn score(candles: &[Candle], params: &IndicatorParams, table: &ScoreTable) -> ScoreOutcome {
    let mut missing = Vec::new();

    let rsi = rsi::rsi(candles, params.rsi_period);
    let macd = macd_crossover(&calculate_macd(
        candles,
        params.macd_fast,
        params.macd_slow,
        params.macd_signal,
    ));
    let position =
        bollinger::bollinger_position(candles, params.bollinger_period, params.bollinger_mult_x100);
    let trend = ma_trend(candles, params.ma_short, params.ma_long);

    record_missing(&mut missing, params.rsi_type(), &rsi);
    record_missing(&mut missing, params.macd_type(), &macd);
    record_missing(&mut missing, params.bollinger_type(), &position);
    record_missing(&mut missing, params.trend_type(), &trend);

    match (rsi, macd, position, trend) {
        (
            IndicatorResult::Defined(rsi),
            IndicatorResult::Defined(macd),
            IndicatorResult::Defined(bollinger_position),
            IndicatorResult::Defined(trend),
        ) => ScoreOutcome::Scored(score_readings(
            &FactorReadings {
                rsi,
                macd,
                bollinger_position,
                trend,
            },
            table,
        )),
        _ => ScoreOutcome::InsufficientData { missing },
    }
}

fn record_missing<T>(
    missing: &mut Vec<MissingIndicator>,
    indicator: IndicatorType,
    result: &IndicatorResult<T>,
) {
    if let Some(reason) = result.undefined_reason() {
        missing.push(MissingIndicator { indicator, reason });
    }
}

pub fn score_readings(readings: &FactorReadings, table: &ScoreTable) -> ScoreBreakdown {
    let rsi = if readings.rsi < table.rsi_oversold {
        (Condition::Oversold, table.rsi_oversold_delta)
    } else if readings.rsi > table.rsi_overbought {
        (Condition::Overbought, table.rsi_overbought_delta)
    } else {
        (Condition::Neutral, table.rsi_neutral_delta)
    };

    let macd = match readings.macd {
        MacdCrossover::Bullish => (Condition::BullishCrossover, table.macd_bullish_delta),
        MacdCrossover::Bearish => (Condition::BearishCrossover, table.macd_bearish_delta),
        MacdCrossover::None => (Condition::NoCrossover, table.macd_flat_delta),
    };

    let band = if readings.bollinger_position < table.bollinger_low {
        (Condition::NearLowerBand, table.bollinger_low_delta)
    } else if readings.bollinger_position > table.bollinger_high {
        (Condition::NearUpperBand, table.bollinger_high_delta)
    } else {
        (Condition::InsideBand, table.bollinger_mid_delta)
    };

    let trend = if readings.trend.is_up() {
        (Condition::TrendUp, table.trend_up_delta)
    } else {
        (Condition::TrendDown, table.trend_down_delta)
    };

    let factors: Vec<FactorScore> = [
        (Factor::Rsi, rsi),
        (Factor::Macd, macd),
        (Factor::Bollinger, band),
        (Factor::MaTrend, trend),
    ]
    .into_iter()
    .map(|(factor, (condition, delta))| FactorScore {
        factor,
        condition,
        delta,
    })
    .collect();

    let raw_total: f64 = factors.iter().map(|f| f.delta).sum();
    ScoreBreakdown {
        factors,
        raw_total,
        total: raw_total.clamp(MIN_SCORE, MAX_SCORE),
    }
}
