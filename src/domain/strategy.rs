//! Strategy policy: one pipeline, pluggable ranking and exit rules.
//!
//! A [`Strategy`] selects the scoring table, the ranking mode and the exit
//! policy. The named presets reproduce the known bot variants; any field can
//! be overridden from configuration.

use crate::domain::ranking::{DEFAULT_MAX_CANDIDATES, DEFAULT_MIN_SCORE, RankingMode, VolumeTier};
use crate::domain::scoring::{IndicatorParams, ScoreTable};
use std::fmt;

pub const DEFAULT_MIN_NOTIONAL: f64 = 5000.0;
pub const DEFAULT_FEE_RESERVE: f64 = 0.9995;

pub const PRESET_NAMES: [&str; 4] = [
    "composite",
    "volume_surge",
    "volume_surge_loose",
    "forced_rotation",
];

/// Venue order-size limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderLimits {
    pub min_notional: f64,
    /// Fraction of cash spendable after fees.
    pub fee_reserve: f64,
}

impl Default for OrderLimits {
    fn default() -> Self {
        OrderLimits {
            min_notional: DEFAULT_MIN_NOTIONAL,
            fee_reserve: DEFAULT_FEE_RESERVE,
        }
    }
}

impl OrderLimits {
    pub fn buy_notional(&self, cash: f64) -> f64 {
        cash * self.fee_reserve
    }

    /// Strict: `cash × fee_reserve > min_notional`.
    pub fn can_buy(&self, cash: f64) -> bool {
        self.buy_notional(cash) > self.min_notional
    }

    /// Strict: `quantity × price > min_notional`.
    pub fn can_sell(&self, quantity: f64, price: f64) -> bool {
        quantity * price > self.min_notional
    }
}

/// Sell triggers of the standard exit policy. `None` disables a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SellRules {
    /// Sell when RSI is strictly above this.
    pub rsi_overbought: Option<f64>,
    /// Sell when a competing candidate's volume ratio exceeds this multiple
    /// of the held instrument's.
    pub opportunity_ratio: Option<f64>,
    pub min_profit_margin: Option<f64>,
    /// Sell when the held score is at or below this.
    pub score_floor: Option<f64>,
    /// Sell when the best candidate outscores the held instrument by at
    /// least this much.
    pub outscore_margin: Option<f64>,
    pub heikin_ashi_reversal: bool,
}

impl Default for SellRules {
    fn default() -> Self {
        SellRules {
            rsi_overbought: Some(70.0),
            opportunity_ratio: Some(1.5),
            min_profit_margin: Some(0.05),
            score_floor: Some(20.0),
            outscore_margin: Some(10.0),
            heikin_ashi_reversal: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitPolicy {
    Standard(SellRules),
    /// Liquidate everything except the top candidate, then buy it.
    ForcedRotation,
}

impl fmt::Display for ExitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitPolicy::Standard(_) => write!(f, "standard"),
            ExitPolicy::ForcedRotation => write!(f, "forced rotation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub indicators: IndicatorParams,
    pub score_table: ScoreTable,
    pub ranking: RankingMode,
    pub exit_policy: ExitPolicy,
    pub limits: OrderLimits,
    pub max_candidates: usize,
    pub max_positions: usize,
    pub excluded: Vec<String>,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::composite()
    }
}

impl Strategy {
    /// Composite score ranking with the standard exit rules.
    pub fn composite() -> Self {
        Strategy {
            name: "composite".into(),
            indicators: IndicatorParams::default(),
            score_table: ScoreTable::default(),
            ranking: RankingMode::CompositeScore {
                min_score: DEFAULT_MIN_SCORE,
            },
            exit_policy: ExitPolicy::Standard(SellRules::default()),
            limits: OrderLimits::default(),
            max_candidates: DEFAULT_MAX_CANDIDATES,
            max_positions: 1,
            excluded: Vec::new(),
        }
    }

    /// Three-tier volume surge screen, 6% profit target.
    pub fn volume_surge() -> Self {
        Strategy {
            name: "volume_surge".into(),
            ranking: RankingMode::VolumeSurge {
                tiers: VolumeTier::standard_tiers(),
            },
            exit_policy: ExitPolicy::Standard(SellRules {
                min_profit_margin: Some(0.06),
                ..SellRules::default()
            }),
            ..Strategy::composite()
        }
    }

    /// Single large-cap tier; the two majors are never candidates.
    pub fn volume_surge_loose() -> Self {
        Strategy {
            name: "volume_surge_loose".into(),
            ranking: RankingMode::VolumeSurge {
                tiers: VolumeTier::loose_tiers(),
            },
            excluded: default_exclusions(),
            ..Strategy::volume_surge()
        }
    }

    pub fn forced_rotation() -> Self {
        Strategy {
            name: "forced_rotation".into(),
            exit_policy: ExitPolicy::ForcedRotation,
            ..Strategy::volume_surge_loose()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "composite" => Some(Strategy::composite()),
            "volume_surge" => Some(Strategy::volume_surge()),
            "volume_surge_loose" => Some(Strategy::volume_surge_loose()),
            "forced_rotation" => Some(Strategy::forced_rotation()),
            _ => None,
        }
    }

    pub fn is_excluded(&self, instrument: &str) -> bool {
        self.excluded.iter().any(|e| e == instrument)
    }
}

fn default_exclusions() -> Vec<String> {
    vec!["KRW-BTC".to_string(), "KRW-ETH".to_string()]
}
