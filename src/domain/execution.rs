//! Order routing for one cycle's decisions.
//!
//! Sells go out before the buy. A rejected order is logged, announced and
//! reported as a failed outcome, and its decision falls back to Hold for the
//! cycle. It is not retried.

use std::fmt;

use tracing::{info, warn};

use super::decision::{Action, OrderIntent, Rationale, TradeDecision};
use super::error::ExecutionFailure;
use crate::ports::notify_port::NotifyPort;
use crate::ports::order_port::OrderPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// A completed order as reported by the venue.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub instrument: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionStatus {
    Filled(Fill),
    Failed(ExecutionFailure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub instrument: String,
    pub side: OrderSide,
    pub status: ExecutionStatus,
}

impl ExecutionOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self.status, ExecutionStatus::Filled(_))
    }
}

/// Places every Buy/Sell decision that carries an order, sells first.
/// Decisions whose order fails are rewritten to Hold in place.
pub fn execute_decisions(
    decisions: &mut [TradeDecision],
    orders: &dyn OrderPort,
    notifier: &dyn NotifyPort,
) -> Vec<ExecutionOutcome> {
    let routed: Vec<usize> = [Action::Sell, Action::Buy]
        .into_iter()
        .flat_map(|action| {
            decisions
                .iter()
                .enumerate()
                .filter(move |(_, d)| d.action == action)
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        })
        .collect();

    let mut outcomes = Vec::with_capacity(routed.len());
    for idx in routed {
        let decision = &mut decisions[idx];
        let Some(order) = decision.order else {
            continue;
        };
        let outcome = execute_one(decision, order, orders, notifier);
        if let ExecutionStatus::Failed(failure) = &outcome.status {
            decision.fall_back_to_hold(failure.clone());
        }
        outcomes.push(outcome);
    }
    outcomes
}

fn execute_one(
    decision: &TradeDecision,
    order: OrderIntent,
    orders: &dyn OrderPort,
    notifier: &dyn NotifyPort,
) -> ExecutionOutcome {
    let instrument = decision.instrument.as_str();
    let (side, result) = match order {
        OrderIntent::Buy { notional } => (OrderSide::Buy, orders.place_buy(instrument, notional)),
        OrderIntent::Sell { quantity } => (OrderSide::Sell, orders.place_sell(instrument, quantity)),
    };

    let status = match result {
        Ok(fill) => {
            info!(
                instrument,
                side = %side,
                quantity = fill.quantity,
                price = fill.price,
                "order filled"
            );
            notifier.notify(&fill_message(decision, &fill));
            ExecutionStatus::Filled(fill)
        }
        Err(failure) => {
            warn!(instrument, side = %side, error = %failure, "order failed");
            notifier.notify(&format!("{side} {instrument} failed: {failure}"));
            ExecutionStatus::Failed(failure)
        }
    };

    ExecutionOutcome {
        instrument: instrument.to_string(),
        side,
        status,
    }
}

/// Human-readable fill alert.
pub fn fill_message(decision: &TradeDecision, fill: &Fill) -> String {
    let mut text = format!(
        "{} {}: {} @ {} ({:.0})",
        fill.side,
        fill.instrument,
        fill.quantity,
        fill.price,
        fill.notional()
    );
    match &decision.rationale {
        Rationale::Entry { candidate, .. } => {
            text.push_str(&format!(
                "\nvolume ratio {:.2}x, RSI {:.2}, traded value {:.0}",
                candidate.volume_ratio, candidate.rsi, candidate.traded_value
            ));
        }
        Rationale::Exit(_) => {
            text.push_str(&format!("\n{}", decision.rationale));
        }
        Rationale::Hold(_) => {}
    }
    text
}
