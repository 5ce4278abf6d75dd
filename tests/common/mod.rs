#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration as StdDuration;
use surgetrader::domain::cycle::{DataRequest, RetryPolicy};
use surgetrader::domain::error::{ExecutionFailure, FetchError, SignalError};
use surgetrader::domain::execution::{Fill, OrderSide};
pub use surgetrader::domain::ohlcv::{Candle, CandleInterval};
use surgetrader::domain::position::BalanceEntry;
use surgetrader::ports::balance_port::BalancePort;
use surgetrader::ports::data_port::MarketDataPort;
use surgetrader::ports::notify_port::NotifyPort;
use surgetrader::ports::order_port::OrderPort;

pub struct MockMarketData {
    /// Listing order.
    pub data: Vec<(String, Vec<Candle>)>,
    /// Errors returned, in order, before the stored candles.
    pub failures: RefCell<HashMap<String, Vec<FetchError>>>,
    pub calls: RefCell<HashMap<String, u32>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            failures: RefCell::new(HashMap::new()),
            calls: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_candles(mut self, instrument: &str, candles: Vec<Candle>) -> Self {
        self.data.push((instrument.to_string(), candles));
        self
    }

    /// The next `times` fetches of `instrument` fail with `error`.
    pub fn with_failures(self, instrument: &str, times: usize, error: FetchError) -> Self {
        self.failures
            .borrow_mut()
            .insert(instrument.to_string(), vec![error; times]);
        self
    }

    pub fn calls(&self, instrument: &str) -> u32 {
        self.calls.borrow().get(instrument).copied().unwrap_or(0)
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_candles(
        &self,
        instrument: &str,
        count: usize,
        _interval: CandleInterval,
    ) -> Result<Vec<Candle>, FetchError> {
        *self
            .calls
            .borrow_mut()
            .entry(instrument.to_string())
            .or_insert(0) += 1;

        if let Some(queue) = self.failures.borrow_mut().get_mut(instrument)
            && !queue.is_empty()
        {
            return Err(queue.remove(0));
        }

        match self.data.iter().find(|(name, _)| name == instrument) {
            Some((_, candles)) => {
                let skip = candles.len().saturating_sub(count);
                Ok(candles[skip..].to_vec())
            }
            None => Err(FetchError::Unavailable {
                reason: format!("unknown instrument {instrument}"),
            }),
        }
    }

    fn list_instruments(&self) -> Result<Vec<String>, FetchError> {
        Ok(self.data.iter().map(|(name, _)| name.clone()).collect())
    }
}

pub struct MockBalances {
    pub entries: Vec<BalanceEntry>,
}

impl MockBalances {
    /// Cash in KRW plus `(instrument, entry_price, quantity)` holdings.
    pub fn new(cash: f64, positions: &[(&str, f64, f64)]) -> Self {
        let mut entries = vec![BalanceEntry {
            instrument: "KRW".to_string(),
            quantity: cash,
            entry_price: 0.0,
        }];
        for &(instrument, entry_price, quantity) in positions {
            entries.push(BalanceEntry {
                instrument: instrument.to_string(),
                quantity,
                entry_price,
            });
        }
        Self { entries }
    }
}

impl BalancePort for MockBalances {
    fn read_balances(&self) -> Result<Vec<BalanceEntry>, SignalError> {
        Ok(self.entries.clone())
    }
}

/// Fills every order at a fixed price unless told to reject it.
pub struct MockOrders {
    pub prices: HashMap<String, f64>,
    pub rejected: Vec<String>,
    pub placed: RefCell<Vec<(OrderSide, String)>>,
}

impl MockOrders {
    pub fn new() -> Self {
        Self {
            prices: HashMap::new(),
            rejected: Vec::new(),
            placed: RefCell::new(Vec::new()),
        }
    }

    pub fn with_price(mut self, instrument: &str, price: f64) -> Self {
        self.prices.insert(instrument.to_string(), price);
        self
    }

    pub fn rejecting(mut self, instrument: &str) -> Self {
        self.rejected.push(instrument.to_string());
        self
    }

    pub fn placed(&self) -> Vec<(OrderSide, String)> {
        self.placed.borrow().clone()
    }

    fn fill(&self, instrument: &str, side: OrderSide, quantity: f64) -> Result<Fill, ExecutionFailure> {
        self.placed
            .borrow_mut()
            .push((side, instrument.to_string()));
        if self.rejected.iter().any(|r| r == instrument) {
            return Err(ExecutionFailure::Rejected {
                reason: "venue closed".to_string(),
            });
        }
        let price = self.prices.get(instrument).copied().unwrap_or(1.0);
        Ok(Fill {
            instrument: instrument.to_string(),
            side,
            quantity,
            price,
            fee: 0.0,
        })
    }
}

impl OrderPort for MockOrders {
    fn place_buy(&self, instrument: &str, notional: f64) -> Result<Fill, ExecutionFailure> {
        let price = self.prices.get(instrument).copied().unwrap_or(1.0);
        self.fill(instrument, OrderSide::Buy, notional / price)
    }

    fn place_sell(&self, instrument: &str, quantity: f64) -> Result<Fill, ExecutionFailure> {
        self.fill(instrument, OrderSide::Sell, quantity)
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub messages: RefCell<Vec<String>>,
}

impl MockNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl NotifyPort for MockNotifier {
    fn notify(&self, text: &str) {
        self.messages.borrow_mut().push(text.to_string());
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

/// One-minute candles with open = high = low = close.
pub fn candles_from_closes(closes: &[f64], volume: f64) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            timestamp: start_time() + Duration::minutes(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume,
        })
        .collect()
}

/// 26 candles: flat at `base` with volume 10, a rise of 3% into candle 24,
/// then a drop to 86% of `base` on volume 300. RSI(14) = 15 and the
/// volume ratio over 20 candles is 30.
pub fn surge_candles(base: f64) -> Vec<Candle> {
    let mut closes = vec![base; 24];
    closes.push(base * 1.03);
    closes.push(base * 0.86);
    let mut candles = candles_from_closes(&closes, 10.0);
    if let Some(last) = candles.last_mut() {
        last.volume = 300.0;
    }
    candles
}

/// `count` candles alternating `low`, `high`, ... with constant volume.
/// RSI(14) is 50 and the volume ratio is 1.
pub fn oscillating_candles(count: usize, low: f64, high: f64) -> Vec<Candle> {
    let closes: Vec<f64> = (0..count)
        .map(|i| if i % 2 == 0 { low } else { high })
        .collect();
    candles_from_closes(&closes, 10.0)
}

/// No retry pause, default everything else.
pub fn fast_request() -> DataRequest {
    DataRequest {
        retry: RetryPolicy {
            attempts: 3,
            interval: StdDuration::ZERO,
        },
        ..DataRequest::default()
    }
}

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
