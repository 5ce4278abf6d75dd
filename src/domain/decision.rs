//! Position-lifecycle decision engine.
//!
//! [`decide`] turns one cycle's analyses and holdings into exactly one
//! [`TradeDecision`] per analysed instrument. Exits for held instruments are
//! settled first; the buy slot is filled afterwards from the pre-cycle cash
//! balance (sell proceeds settle later and are only visible next cycle).

use crate::domain::analysis::InstrumentAnalysis;
use crate::domain::error::ExecutionFailure;
use crate::domain::heikin_ashi::HeikinAshiSignal;
use crate::domain::indicator::IndicatorResult;
use crate::domain::portfolio::Holdings;
use crate::domain::position::Position;
use crate::domain::ranking::{rank, Candidate, Ranking, RejectReason};
use crate::domain::scoring::ScoreOutcome;
use crate::domain::strategy::{ExitPolicy, OrderLimits, SellRules, Strategy};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SellTrigger {
    RsiOverbought {
        rsi: f64,
        threshold: f64,
    },
    OpportunityCost {
        competitor: String,
        competitor_ratio: f64,
        held_ratio: f64,
        multiple: f64,
    },
    ProfitTarget {
        profit: f64,
        margin: f64,
    },
    ScoreFloor {
        score: f64,
        floor: f64,
    },
    Outscored {
        competitor: String,
        competitor_score: f64,
        held_score: f64,
        margin: f64,
    },
    HeikinAshiReversal,
    Rotation {
        target: String,
    },
}

impl fmt::Display for SellTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellTrigger::RsiOverbought { rsi, threshold } => {
                write!(f, "RSI {rsi:.2} above {threshold:.2}")
            }
            SellTrigger::OpportunityCost {
                competitor,
                competitor_ratio,
                held_ratio,
                multiple,
            } => write!(
                f,
                "{competitor} volume ratio {competitor_ratio:.2} exceeds {multiple}x held {held_ratio:.2}"
            ),
            SellTrigger::ProfitTarget { profit, margin } => write!(
                f,
                "profit {:.2}% reached target {:.2}%",
                profit * 100.0,
                margin * 100.0
            ),
            SellTrigger::ScoreFloor { score, floor } => {
                write!(f, "score {score:.1} at or below {floor:.1}")
            }
            SellTrigger::Outscored {
                competitor,
                competitor_score,
                held_score,
                margin,
            } => write!(
                f,
                "{competitor} score {competitor_score:.1} beats held {held_score:.1} by at least {margin:.1}"
            ),
            SellTrigger::HeikinAshiReversal => write!(f, "Heikin-Ashi bearish reversal"),
            SellTrigger::Rotation { target } => write!(f, "rotating into {target}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HoldReason {
    BelowMinimumNotional { notional: f64, minimum: f64 },
    SlotsFull { held: usize, max: usize },
    NoQualifyingCandidate,
    NotSelected,
    Rejected(RejectReason),
    NoSellTrigger,
    RotationTarget,
    /// The order went out and the venue refused it.
    ExecutionFailed(ExecutionFailure),
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::BelowMinimumNotional { notional, minimum } => write!(
                f,
                "below minimum notional ({notional:.2} not above {minimum:.2})"
            ),
            HoldReason::SlotsFull { held, max } => write!(f, "slots full ({held}/{max})"),
            HoldReason::NoQualifyingCandidate => write!(f, "no qualifying candidate"),
            HoldReason::NotSelected => write!(f, "not selected"),
            HoldReason::Rejected(reason) => write!(f, "{reason}"),
            HoldReason::NoSellTrigger => write!(f, "no sell trigger"),
            HoldReason::RotationTarget => write!(f, "already holding rotation target"),
            HoldReason::ExecutionFailed(failure) => write!(f, "order failed: {failure}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rationale {
    /// Buy: the ranked candidate that won the slot.
    Entry { rank: usize, candidate: Candidate },
    /// Sell: every trigger that fired.
    Exit(Vec<SellTrigger>),
    Hold(HoldReason),
}

impl fmt::Display for Rationale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rationale::Entry { rank, candidate } => {
                write!(f, "ranked #{rank}")?;
                if let Some(score) = candidate.score {
                    write!(f, ", score {score:.1}")?;
                }
                write!(
                    f,
                    ", volume ratio {:.2}, RSI {:.2}, traded value {:.0}",
                    candidate.volume_ratio, candidate.rsi, candidate.traded_value
                )
            }
            Rationale::Exit(triggers) => {
                for (i, t) in triggers.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{t}")?;
                }
                Ok(())
            }
            Rationale::Hold(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderIntent {
    /// Spend this much cash.
    Buy { notional: f64 },
    Sell { quantity: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeDecision {
    pub action: Action,
    pub instrument: String,
    pub rationale: Rationale,
    pub order: Option<OrderIntent>,
    pub score: ScoreOutcome,
}

impl TradeDecision {
    fn hold(analysis: &InstrumentAnalysis, reason: HoldReason) -> Self {
        TradeDecision {
            action: Action::Hold,
            instrument: analysis.instrument.clone(),
            rationale: Rationale::Hold(reason),
            order: None,
            score: analysis.score.clone(),
        }
    }

    /// Turns a Buy/Sell whose order failed into a Hold for this cycle.
    pub fn fall_back_to_hold(&mut self, failure: ExecutionFailure) {
        self.action = Action::Hold;
        self.order = None;
        self.rationale = Rationale::Hold(HoldReason::ExecutionFailed(failure));
    }

    pub fn hold_reason(&self) -> Option<&HoldReason> {
        match &self.rationale {
            Rationale::Hold(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn sell_triggers(&self) -> &[SellTrigger] {
        match &self.rationale {
            Rationale::Exit(triggers) => triggers,
            _ => &[],
        }
    }
}

impl fmt::Display for TradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.action, self.instrument, self.rationale)
    }
}

/// Everything one decision step looks at. Built fresh every cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleContext<'a> {
    pub strategy: &'a Strategy,
    /// Scan order.
    pub analyses: &'a [InstrumentAnalysis],
    pub holdings: &'a Holdings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleDecisions {
    /// One per analysed instrument, in scan order.
    pub decisions: Vec<TradeDecision>,
    pub ranking: Ranking,
}

impl CycleDecisions {
    pub fn for_instrument(&self, instrument: &str) -> Option<&TradeDecision> {
        self.decisions.iter().find(|d| d.instrument == instrument)
    }

    pub fn with_action(&self, action: Action) -> impl Iterator<Item = &TradeDecision> {
        self.decisions.iter().filter(move |d| d.action == action)
    }

    pub fn buy(&self) -> Option<&TradeDecision> {
        self.with_action(Action::Buy).next()
    }
}

pub fn decide(ctx: &CycleContext<'_>) -> CycleDecisions {
    let strategy = ctx.strategy;
    let ranking = rank(
        ctx.analyses,
        &strategy.ranking,
        strategy.max_candidates,
        &strategy.excluded,
    );

    let mut settled: Vec<Option<TradeDecision>> = vec![None; ctx.analyses.len()];

    // Exits.
    let mut occupied = 0usize;
    for position in &ctx.holdings.positions {
        let Some(idx) = ctx
            .analyses
            .iter()
            .position(|a| a.instrument == position.instrument)
        else {
            // Unpriced this cycle: keeps its slot, no decision.
            occupied += 1;
            continue;
        };
        let analysis = &ctx.analyses[idx];

        let triggers = match &strategy.exit_policy {
            ExitPolicy::Standard(rules) => standard_triggers(analysis, position, &ranking, rules),
            ExitPolicy::ForcedRotation => match ranking.top() {
                Some(top) if top.instrument == analysis.instrument => {
                    settled[idx] = Some(TradeDecision::hold(analysis, HoldReason::RotationTarget));
                    occupied += 1;
                    continue;
                }
                Some(top) => vec![SellTrigger::Rotation {
                    target: top.instrument.clone(),
                }],
                None => {
                    settled[idx] = Some(TradeDecision::hold(
                        analysis,
                        HoldReason::NoQualifyingCandidate,
                    ));
                    occupied += 1;
                    continue;
                }
            },
        };

        let price = analysis.current_price;
        // Dust below the venue minimum cannot be sold and never occupies a
        // slot, whichever rules fired.
        let dust = !strategy.limits.can_sell(position.quantity, price);
        let decision = if triggers.is_empty() {
            if !dust {
                occupied += 1;
            }
            TradeDecision::hold(analysis, HoldReason::NoSellTrigger)
        } else if dust {
            TradeDecision::hold(
                analysis,
                HoldReason::BelowMinimumNotional {
                    notional: position.market_value(price),
                    minimum: strategy.limits.min_notional,
                },
            )
        } else {
            TradeDecision {
                action: Action::Sell,
                instrument: analysis.instrument.clone(),
                rationale: Rationale::Exit(triggers),
                order: Some(OrderIntent::Sell {
                    quantity: position.quantity,
                }),
                score: analysis.score.clone(),
            }
        };
        settled[idx] = Some(decision);
    }

    // Entry, after every exit is known.
    let target = match strategy.exit_policy {
        ExitPolicy::ForcedRotation => ranking
            .top()
            .filter(|top| !ctx.holdings.has_position(&top.instrument))
            .map(|top| (1, top)),
        ExitPolicy::Standard(_) => ranking
            .shortlist
            .iter()
            .enumerate()
            .find(|(_, c)| !ctx.holdings.has_position(&c.instrument))
            .map(|(i, c)| (i + 1, c)),
    };

    if let Some((position_rank, candidate)) = target
        && let Some(idx) = ctx
            .analyses
            .iter()
            .position(|a| a.instrument == candidate.instrument)
    {
        let analysis = &ctx.analyses[idx];
        let slots_apply = matches!(strategy.exit_policy, ExitPolicy::Standard(_));
        settled[idx] = Some(entry_decision(
            analysis,
            position_rank,
            candidate,
            &strategy.limits,
            ctx.holdings.cash,
            (slots_apply && occupied >= strategy.max_positions)
                .then_some((occupied, strategy.max_positions)),
        ));
    }

    let decisions = ctx
        .analyses
        .iter()
        .zip(settled)
        .map(|(analysis, decision)| {
            decision.unwrap_or_else(|| {
                let reason = match ranking.rejection_for(&analysis.instrument) {
                    Some(reason) => HoldReason::Rejected(reason.clone()),
                    None if ranking.shortlist.is_empty() => HoldReason::NoQualifyingCandidate,
                    None => HoldReason::NotSelected,
                };
                TradeDecision::hold(analysis, reason)
            })
        })
        .collect();

    CycleDecisions { decisions, ranking }
}

fn entry_decision(
    analysis: &InstrumentAnalysis,
    rank: usize,
    candidate: &Candidate,
    limits: &OrderLimits,
    cash: f64,
    slots_full: Option<(usize, usize)>,
) -> TradeDecision {
    if let Some((held, max)) = slots_full {
        return TradeDecision::hold(analysis, HoldReason::SlotsFull { held, max });
    }
    if !limits.can_buy(cash) {
        return TradeDecision::hold(
            analysis,
            HoldReason::BelowMinimumNotional {
                notional: limits.buy_notional(cash),
                minimum: limits.min_notional,
            },
        );
    }
    TradeDecision {
        action: Action::Buy,
        instrument: analysis.instrument.clone(),
        rationale: Rationale::Entry {
            rank,
            candidate: candidate.clone(),
        },
        order: Some(OrderIntent::Buy {
            notional: limits.buy_notional(cash),
        }),
        score: analysis.score.clone(),
    }
}

/// Every standard exit rule that fires for `position`.
fn standard_triggers(
    analysis: &InstrumentAnalysis,
    position: &Position,
    ranking: &Ranking,
    rules: &SellRules,
) -> Vec<SellTrigger> {
    let mut triggers = Vec::new();
    let competitors = move || {
        ranking
            .shortlist
            .iter()
            .filter(move |c| c.instrument != analysis.instrument)
    };

    if let (Some(threshold), IndicatorResult::Defined(rsi)) = (rules.rsi_overbought, analysis.rsi)
        && rsi > threshold
    {
        triggers.push(SellTrigger::RsiOverbought { rsi, threshold });
    }

    if let (Some(multiple), IndicatorResult::Defined(held_ratio)) =
        (rules.opportunity_ratio, analysis.volume_ratio)
        && let Some(best) = first_max(competitors(), |c| Some(c.volume_ratio))
        && best.volume_ratio > multiple * held_ratio
    {
        triggers.push(SellTrigger::OpportunityCost {
            competitor: best.instrument.clone(),
            competitor_ratio: best.volume_ratio,
            held_ratio,
            multiple,
        });
    }

    if let Some(margin) = rules.min_profit_margin
        && let Some(profit) = position.profit_ratio(analysis.current_price)
        && profit >= margin
    {
        triggers.push(SellTrigger::ProfitTarget { profit, margin });
    }

    if let Some(held_score) = analysis.scored() {
        if let Some(floor) = rules.score_floor
            && held_score <= floor
        {
            triggers.push(SellTrigger::ScoreFloor {
                score: held_score,
                floor,
            });
        }
        if let Some(margin) = rules.outscore_margin
            && let Some(best) = first_max(competitors(), |c| c.score)
            && let Some(competitor_score) = best.score
            && competitor_score - held_score >= margin
        {
            triggers.push(SellTrigger::Outscored {
                competitor: best.instrument.clone(),
                competitor_score,
                held_score,
                margin,
            });
        }
    }

    if rules.heikin_ashi_reversal && analysis.heikin_ashi == HeikinAshiSignal::Sell {
        triggers.push(SellTrigger::HeikinAshiReversal);
    }

    triggers
}

/// Highest keyed candidate; the earliest wins ties.
fn first_max<'a>(
    candidates: impl Iterator<Item = &'a Candidate>,
    key: impl Fn(&Candidate) -> Option<f64>,
) -> Option<&'a Candidate> {
    let mut best: Option<(&Candidate, f64)> = None;
    for candidate in candidates {
        let Some(value) = key(candidate) else {
            continue;
        };
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((candidate, value)),
        }
    }
    best.map(|(c, _)| c)
}
