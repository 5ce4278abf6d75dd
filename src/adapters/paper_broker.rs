//! In-memory broker that fills market orders at the last known close.
//!
//! Starts from the cycle's holdings and charges `1 - fee_reserve` of each
//! order's notional as fee. Nothing leaves the process.

use std::cell::RefCell;
use std::collections::HashMap;

use tracing::debug;

use crate::domain::error::ExecutionFailure;
use crate::domain::execution::{Fill, OrderSide};
use crate::domain::portfolio::Holdings;
use crate::domain::strategy::OrderLimits;
use crate::ports::order_port::OrderPort;

#[derive(Debug, Default)]
struct Ledger {
    cash: f64,
    quantities: HashMap<String, f64>,
    fills: Vec<Fill>,
}

pub struct PaperBroker {
    prices: HashMap<String, f64>,
    limits: OrderLimits,
    cash_asset: String,
    ledger: RefCell<Ledger>,
}

impl PaperBroker {
    pub fn new(
        holdings: &Holdings,
        prices: HashMap<String, f64>,
        limits: OrderLimits,
        cash_asset: &str,
    ) -> Self {
        let quantities = holdings
            .positions
            .iter()
            .map(|p| (p.instrument.clone(), p.quantity))
            .collect();
        Self {
            prices,
            limits,
            cash_asset: cash_asset.to_string(),
            ledger: RefCell::new(Ledger {
                cash: holdings.cash,
                quantities,
                fills: Vec::new(),
            }),
        }
    }

    pub fn cash(&self) -> f64 {
        self.ledger.borrow().cash
    }

    pub fn quantity(&self, instrument: &str) -> f64 {
        self.ledger
            .borrow()
            .quantities
            .get(instrument)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn fills(&self) -> Vec<Fill> {
        self.ledger.borrow().fills.clone()
    }

    fn fee_rate(&self) -> f64 {
        1.0 - self.limits.fee_reserve
    }

    fn price(&self, instrument: &str) -> Result<f64, ExecutionFailure> {
        match self.prices.get(instrument) {
            Some(&price) if price > 0.0 => Ok(price),
            _ => Err(ExecutionFailure::Rejected {
                reason: format!("no price for {instrument}"),
            }),
        }
    }

    fn check_notional(&self, notional: f64) -> Result<(), ExecutionFailure> {
        if notional > self.limits.min_notional {
            Ok(())
        } else {
            Err(ExecutionFailure::BelowMinimumNotional {
                notional,
                minimum: self.limits.min_notional,
            })
        }
    }
}

impl OrderPort for PaperBroker {
    fn place_buy(&self, instrument: &str, notional: f64) -> Result<Fill, ExecutionFailure> {
        let price = self.price(instrument)?;
        self.check_notional(notional)?;

        let fee = notional * self.fee_rate();
        let mut ledger = self.ledger.borrow_mut();
        if notional + fee > ledger.cash {
            return Err(ExecutionFailure::InsufficientBalance {
                instrument: self.cash_asset.clone(),
                requested: notional + fee,
                available: ledger.cash,
            });
        }

        let fill = Fill {
            instrument: instrument.to_string(),
            side: OrderSide::Buy,
            quantity: notional / price,
            price,
            fee,
        };
        ledger.cash -= notional + fee;
        *ledger.quantities.entry(instrument.to_string()).or_insert(0.0) += fill.quantity;
        ledger.fills.push(fill.clone());
        debug!(instrument, cash = ledger.cash, "paper buy filled");
        Ok(fill)
    }

    fn place_sell(&self, instrument: &str, quantity: f64) -> Result<Fill, ExecutionFailure> {
        let price = self.price(instrument)?;
        let mut ledger = self.ledger.borrow_mut();
        let held = ledger.quantities.get(instrument).copied().unwrap_or(0.0);
        if quantity > held {
            return Err(ExecutionFailure::InsufficientBalance {
                instrument: instrument.to_string(),
                requested: quantity,
                available: held,
            });
        }

        let notional = quantity * price;
        self.check_notional(notional)?;

        let fee = notional * self.fee_rate();
        let fill = Fill {
            instrument: instrument.to_string(),
            side: OrderSide::Sell,
            quantity,
            price,
            fee,
        };
        ledger.cash += notional - fee;
        let remaining = held - quantity;
        if remaining > 0.0 {
            ledger.quantities.insert(instrument.to_string(), remaining);
        } else {
            ledger.quantities.remove(instrument);
        }
        ledger.fills.push(fill.clone());
        debug!(instrument, cash = ledger.cash, "paper sell filled");
        Ok(fill)
    }
}
