//! Per-instrument indicator snapshot consumed by the ranker and decision engine.

use crate::domain::heikin_ashi::{heikin_ashi_signal, HeikinAshiSignal};
use crate::domain::indicator::{rsi, volume_ratio, IndicatorResult};
use crate::domain::ohlcv::Candle;
use crate::domain::scoring::{score, IndicatorParams, ScoreOutcome, ScoreTable};

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentAnalysis {
    pub instrument: String,
    pub current_price: f64,
    /// Latest close × latest volume.
    pub traded_value: f64,
    pub rsi: IndicatorResult<f64>,
    pub volume_ratio: IndicatorResult<f64>,
    pub score: ScoreOutcome,
    pub heikin_ashi: HeikinAshiSignal,
}

impl InstrumentAnalysis {
    /// `None` for an empty candle sequence.
    pub fn from_candles(
        instrument: &str,
        candles: &[Candle],
        params: &IndicatorParams,
        table: &ScoreTable,
    ) -> Option<Self> {
        let last = candles.last()?;
        Some(Self {
            instrument: instrument.to_string(),
            current_price: last.close,
            traded_value: last.traded_value(),
            rsi: rsi(candles, params.rsi_period),
            volume_ratio: volume_ratio(candles, params.volume_window),
            score: score(candles, params, table),
            heikin_ashi: heikin_ashi_signal(candles),
        })
    }

    /// Volume ratio with an undefined ratio read as 0.
    pub fn volume_ratio_or_zero(&self) -> f64 {
        self.volume_ratio.defined().unwrap_or(0.0)
    }

    /// The composite score when it could be computed.
    pub fn scored(&self) -> Option<f64> {
        self.score.breakdown().map(|b| b.total)
    }
}
