//! Candidate ranking across an instrument universe.
//!
//! Two modes, selected by [`RankingMode`]:
//! - composite score: keep instruments scoring at least `min_score`, best first
//! - volume surge: tiered volume-ratio/RSI screen by traded value, largest
//!   traded value first
//!
//! Both sorts are stable, so ties keep scan order. The shortlist is capped at
//! `max_candidates`.

use crate::domain::analysis::InstrumentAnalysis;
use crate::domain::indicator::{IndicatorResult, UndefinedReason};
use std::fmt;
use tracing::debug;

pub const DEFAULT_MAX_CANDIDATES: usize = 5;
pub const DEFAULT_MIN_SCORE: f64 = 45.0;

/// Screening thresholds for instruments whose traded value is at least
/// `min_traded_value`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeTier {
    pub min_traded_value: f64,
    /// Volume ratio must be strictly above this.
    pub min_volume_ratio: f64,
    /// RSI must be strictly below this.
    pub max_rsi: f64,
}

impl VolumeTier {
    pub fn new(min_traded_value: f64, min_volume_ratio: f64, max_rsi: f64) -> Self {
        Self {
            min_traded_value,
            min_volume_ratio,
            max_rsi,
        }
    }

    /// ≥1e9: ratio > 3, RSI < 30; ≥1e8: ratio > 4, RSI < 25; below: ratio > 5, RSI < 20.
    pub fn standard_tiers() -> Vec<VolumeTier> {
        vec![
            VolumeTier::new(1e9, 3.0, 30.0),
            VolumeTier::new(1e8, 4.0, 25.0),
            VolumeTier::new(0.0, 5.0, 20.0),
        ]
    }

    /// Only ≥1e9 traded value qualifies: ratio > 2, RSI < 30.
    pub fn loose_tiers() -> Vec<VolumeTier> {
        vec![VolumeTier::new(1e9, 2.0, 30.0)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RankingMode {
    CompositeScore { min_score: f64 },
    VolumeSurge { tiers: Vec<VolumeTier> },
}

impl fmt::Display for RankingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankingMode::CompositeScore { min_score } => {
                write!(f, "composite score (min {min_score})")
            }
            RankingMode::VolumeSurge { tiers } => write!(f, "volume surge ({} tiers)", tiers.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub instrument: String,
    /// `None` when the composite score could not be computed.
    pub score: Option<f64>,
    pub volume_ratio: f64,
    pub rsi: f64,
    pub current_price: f64,
    pub traded_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    Excluded,
    InsufficientScoreData,
    BelowMinScore { score: f64, min_score: f64 },
    RsiUndefined(UndefinedReason),
    VolumeRatioUndefined(UndefinedReason),
    NoTier { traded_value: f64 },
    VolumeRatioTooLow { ratio: f64, required: f64 },
    RsiTooHigh { rsi: f64, max: f64 },
    OutsideShortlist { rank: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Excluded => write!(f, "excluded"),
            RejectReason::InsufficientScoreData => write!(f, "insufficient data for score"),
            RejectReason::BelowMinScore { score, min_score } => {
                write!(f, "score {score:.1} below {min_score:.1}")
            }
            RejectReason::RsiUndefined(reason) => write!(f, "RSI undefined: {reason}"),
            RejectReason::VolumeRatioUndefined(reason) => {
                write!(f, "volume ratio undefined: {reason}")
            }
            RejectReason::NoTier { traded_value } => {
                write!(f, "traded value {traded_value:.0} below every tier")
            }
            RejectReason::VolumeRatioTooLow { ratio, required } => {
                write!(f, "volume ratio {ratio:.2} not above {required:.2}")
            }
            RejectReason::RsiTooHigh { rsi, max } => write!(f, "RSI {rsi:.2} not below {max:.2}"),
            RejectReason::OutsideShortlist { rank } => write!(f, "ranked {rank}, outside shortlist"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub instrument: String,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ranking {
    /// Qualifying candidates, best first.
    pub shortlist: Vec<Candidate>,
    pub rejected: Vec<Rejection>,
}

impl Ranking {
    pub fn top(&self) -> Option<&Candidate> {
        self.shortlist.first()
    }

    pub fn rejection_for(&self, instrument: &str) -> Option<&RejectReason> {
        self.rejected
            .iter()
            .find(|r| r.instrument == instrument)
            .map(|r| &r.reason)
    }
}

pub fn rank(
    analyses: &[InstrumentAnalysis],
    mode: &RankingMode,
    max_candidates: usize,
    excluded: &[String],
) -> Ranking {
    let mut qualified: Vec<Candidate> = Vec::new();
    let mut rejected: Vec<Rejection> = Vec::new();

    for analysis in analyses {
        if excluded.iter().any(|e| e == &analysis.instrument) {
            rejected.push(Rejection {
                instrument: analysis.instrument.clone(),
                reason: RejectReason::Excluded,
            });
            continue;
        }

        let screened = match mode {
            RankingMode::CompositeScore { min_score } => screen_by_score(analysis, *min_score),
            RankingMode::VolumeSurge { tiers } => screen_by_volume(analysis, tiers),
        };

        match screened {
            Ok(candidate) => {
                debug!(
                    instrument = %candidate.instrument,
                    volume_ratio = candidate.volume_ratio,
                    rsi = candidate.rsi,
                    traded_value = candidate.traded_value,
                    "candidate found"
                );
                qualified.push(candidate);
            }
            Err(reason) => rejected.push(Rejection {
                instrument: analysis.instrument.clone(),
                reason,
            }),
        }
    }

    // Vec::sort_by is stable: equal keys keep scan order.
    match mode {
        RankingMode::CompositeScore { .. } => qualified.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
        }),
        RankingMode::VolumeSurge { .. } => {
            qualified.sort_by(|a, b| b.traded_value.total_cmp(&a.traded_value))
        }
    }

    if qualified.len() > max_candidates {
        for (i, dropped) in qualified.drain(max_candidates..).enumerate() {
            rejected.push(Rejection {
                instrument: dropped.instrument,
                reason: RejectReason::OutsideShortlist {
                    rank: max_candidates + i + 1,
                },
            });
        }
    }

    Ranking {
        shortlist: qualified,
        rejected,
    }
}

fn screen_by_score(analysis: &InstrumentAnalysis, min_score: f64) -> Result<Candidate, RejectReason> {
    let score = analysis.scored().ok_or(RejectReason::InsufficientScoreData)?;
    if score < min_score {
        return Err(RejectReason::BelowMinScore { score, min_score });
    }
    // A computed score implies a defined RSI.
    let rsi = analysis.rsi.defined().unwrap_or(0.0);
    Ok(candidate_from(analysis, Some(score), rsi))
}

fn screen_by_volume(
    analysis: &InstrumentAnalysis,
    tiers: &[VolumeTier],
) -> Result<Candidate, RejectReason> {
    let ratio = match analysis.volume_ratio {
        IndicatorResult::Defined(ratio) => ratio,
        IndicatorResult::Undefined(reason) => return Err(RejectReason::VolumeRatioUndefined(reason)),
    };
    let rsi = match analysis.rsi {
        IndicatorResult::Defined(rsi) => rsi,
        IndicatorResult::Undefined(reason) => return Err(RejectReason::RsiUndefined(reason)),
    };

    let tier = tier_for(tiers, analysis.traded_value).ok_or(RejectReason::NoTier {
        traded_value: analysis.traded_value,
    })?;
    if ratio <= tier.min_volume_ratio {
        return Err(RejectReason::VolumeRatioTooLow {
            ratio,
            required: tier.min_volume_ratio,
        });
    }
    if rsi >= tier.max_rsi {
        return Err(RejectReason::RsiTooHigh {
            rsi,
            max: tier.max_rsi,
        });
    }
    Ok(candidate_from(analysis, analysis.scored(), rsi))
}

/// The tier with the highest floor not above `traded_value`.
pub fn tier_for(tiers: &[VolumeTier], traded_value: f64) -> Option<&VolumeTier> {
    tiers
        .iter()
        .filter(|t| traded_value >= t.min_traded_value)
        .max_by(|a, b| a.min_traded_value.total_cmp(&b.min_traded_value))
}

fn candidate_from(analysis: &InstrumentAnalysis, score: Option<f64>, rsi: f64) -> Candidate {
    Candidate {
        instrument: analysis.instrument.clone(),
        score,
        volume_ratio: analysis.volume_ratio_or_zero(),
        rsi,
        current_price: analysis.current_price,
        traded_value: analysis.traded_value,
    }
}
