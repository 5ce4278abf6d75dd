//! One decision cycle: balances, snapshot, analysis, decisions, execution.
//!
//! Candles are fetched instrument by instrument, so the snapshot is not a
//! single point in time. Each series keeps its own `fetched_at` and
//! [`Snapshot::scan_skew`] reports the spread; comparisons across
//! instruments accept that staleness.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::domain::analysis::InstrumentAnalysis;
use crate::domain::decision::{decide, Action, CycleContext, CycleDecisions};
use crate::domain::error::{FetchError, SignalError};
use crate::domain::execution::{execute_decisions, ExecutionOutcome};
use crate::domain::ohlcv::{Candle, CandleInterval};
use crate::domain::portfolio::Holdings;
use crate::domain::strategy::Strategy;
use crate::domain::universe::{build_universe, Universe};
use crate::ports::balance_port::BalancePort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::notify_port::NotifyPort;
use crate::ports::order_port::OrderPort;

pub const DEFAULT_CANDLE_COUNT: usize = 200;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CASH_ASSET: &str = "KRW";

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails fatally, or attempts run out.
    /// Returns the last result and the number of attempts made.
    pub fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, FetchError>,
    ) -> (Result<T, FetchError>, u32) {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return (Ok(value), attempt),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    warn!(what, attempt, attempts, error = %err, "fetch failed, retrying");
                    if !self.interval.is_zero() {
                        thread::sleep(self.interval);
                    }
                    attempt += 1;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }
}

/// What to fetch each cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    /// Scan list; `None` asks the market-data port.
    pub instruments: Option<Vec<String>>,
    pub candle_count: usize,
    pub interval: CandleInterval,
    pub retry: RetryPolicy,
    /// Balance row read as cash.
    pub cash_asset: String,
}

impl Default for DataRequest {
    fn default() -> Self {
        DataRequest {
            instruments: None,
            candle_count: DEFAULT_CANDLE_COUNT,
            interval: CandleInterval::default(),
            retry: RetryPolicy::default(),
            cash_asset: DEFAULT_CASH_ASSET.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSeries {
    pub instrument: String,
    /// Never empty.
    pub candles: Vec<Candle>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    DataUnavailable { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInstrument {
    pub instrument: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    /// Fetch order.
    pub series: Vec<InstrumentSeries>,
    pub skipped: Vec<SkippedInstrument>,
}

impl Snapshot {
    /// Time between the first and last successful fetch.
    pub fn scan_skew(&self) -> TimeDelta {
        let times = self.series.iter().map(|s| s.fetched_at);
        match (times.clone().min(), times.max()) {
            (Some(first), Some(last)) => last - first,
            _ => TimeDelta::zero(),
        }
    }

    pub fn get(&self, instrument: &str) -> Option<&InstrumentSeries> {
        self.series.iter().find(|s| s.instrument == instrument)
    }
}

pub fn collect_snapshot(
    port: &dyn MarketDataPort,
    instruments: &[String],
    request: &DataRequest,
) -> Result<Snapshot, SignalError> {
    collect_snapshot_with_clock(port, instruments, request, &Utc::now)
}

/// [`collect_snapshot`] with an injectable clock.
pub fn collect_snapshot_with_clock(
    port: &dyn MarketDataPort,
    instruments: &[String],
    request: &DataRequest,
    clock: &dyn Fn() -> DateTime<Utc>,
) -> Result<Snapshot, SignalError> {
    let mut snapshot = Snapshot::default();

    for instrument in instruments {
        let (result, attempts) = request.retry.run(instrument, || {
            let candles = port.fetch_candles(instrument, request.candle_count, request.interval)?;
            if candles.is_empty() {
                return Err(FetchError::Unavailable {
                    reason: "no candles returned".to_string(),
                });
            }
            Ok(candles)
        });

        match result {
            Ok(candles) => {
                debug!(%instrument, candles = candles.len(), attempts, "fetched");
                snapshot.series.push(InstrumentSeries {
                    instrument: instrument.clone(),
                    candles,
                    fetched_at: clock(),
                });
            }
            Err(FetchError::Unavailable { reason }) => {
                warn!(%instrument, attempts, %reason, "skipping instrument this cycle");
                snapshot.skipped.push(SkippedInstrument {
                    instrument: instrument.clone(),
                    reason: SkipReason::DataUnavailable {
                        attempts,
                        last_error: reason,
                    },
                });
            }
            Err(FetchError::Fatal { reason }) => {
                return Err(SignalError::DataFatal {
                    instrument: instrument.clone(),
                    reason,
                });
            }
        }
    }

    Ok(snapshot)
}

/// Indicator analyses for every fetched series, in fetch order.
pub fn analyse_snapshot(snapshot: &Snapshot, strategy: &Strategy) -> Vec<InstrumentAnalysis> {
    snapshot
        .series
        .iter()
        .filter_map(|series| {
            let analysis = InstrumentAnalysis::from_candles(
                &series.instrument,
                &series.candles,
                &strategy.indicators,
                &strategy.score_table,
            )?;
            debug!(
                instrument = %analysis.instrument,
                score = %analysis.score,
                heikin_ashi = %analysis.heikin_ashi,
                "analysed"
            );
            Some(analysis)
        })
        .collect()
}

pub struct CyclePorts<'a> {
    pub market_data: &'a dyn MarketDataPort,
    pub balances: &'a dyn BalancePort,
    pub orders: &'a dyn OrderPort,
    pub notifier: &'a dyn NotifyPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Decide only.
    DryRun,
    /// Route Buy/Sell decisions to the order port.
    Execute,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub holdings: Holdings,
    pub universe: Universe,
    pub skipped: Vec<SkippedInstrument>,
    pub scan_skew: TimeDelta,
    pub analyses: Vec<InstrumentAnalysis>,
    pub decisions: CycleDecisions,
    pub executions: Vec<ExecutionOutcome>,
}

pub fn run_cycle(
    ports: &CyclePorts<'_>,
    strategy: &Strategy,
    request: &DataRequest,
    mode: ExecutionMode,
) -> Result<CycleReport, SignalError> {
    let entries = ports.balances.read_balances()?;
    let holdings = Holdings::from_balances(&entries, &request.cash_asset)?;

    let listed = match &request.instruments {
        Some(listed) => listed.clone(),
        None => {
            let (result, _) = request
                .retry
                .run("instrument list", || ports.market_data.list_instruments());
            result.map_err(|e| SignalError::DataFatal {
                instrument: "*".to_string(),
                reason: e.to_string(),
            })?
        }
    };

    let universe = build_universe(&listed, &strategy.excluded, &holdings);
    if universe.is_empty() {
        return Err(SignalError::NoInstruments);
    }
    info!(
        strategy = %strategy.name,
        instruments = universe.count(),
        held = holdings.position_count(),
        cash = holdings.cash,
        "cycle started"
    );

    let snapshot = collect_snapshot(ports.market_data, &universe.instruments, request)?;
    let scan_skew = snapshot.scan_skew();
    let analyses = analyse_snapshot(&snapshot, strategy);

    let mut decisions = decide(&CycleContext {
        strategy,
        analyses: &analyses,
        holdings: &holdings,
    });
    for decision in &decisions.decisions {
        match decision.action {
            Action::Hold => debug!(%decision, "decision"),
            Action::Buy | Action::Sell => info!(%decision, "decision"),
        }
    }

    let executions = match mode {
        ExecutionMode::DryRun => Vec::new(),
        ExecutionMode::Execute => {
            execute_decisions(&mut decisions.decisions, ports.orders, ports.notifier)
        }
    };

    let buys = decisions.with_action(Action::Buy).count();
    let sells = decisions.with_action(Action::Sell).count();
    if mode == ExecutionMode::DryRun
        && (buys + sells > 0 || decisions.ranking.top().is_some())
    {
        ports
            .notifier
            .notify(&dry_run_summary(&strategy.name, buys, sells, &decisions));
    }
    info!(
        buys,
        sells,
        holds = decisions.decisions.len() - buys - sells,
        skipped = snapshot.skipped.len(),
        scan_skew_ms = scan_skew.num_milliseconds(),
        "cycle finished"
    );

    Ok(CycleReport {
        holdings,
        universe,
        skipped: snapshot.skipped,
        scan_skew,
        analyses,
        decisions,
        executions,
    })
}

/// Signal counts plus the top candidate's surge stats.
fn dry_run_summary(name: &str, buys: usize, sells: usize, decisions: &CycleDecisions) -> String {
    let mut text = format!("{name}: {buys} buy, {sells} sell signal(s) (dry run)");
    if let Some(top) = decisions.ranking.top() {
        text.push_str(&format!(
            "\ntop {}: volume ratio {:.2}x, RSI {:.2}, traded value {:.0}",
            top.instrument, top.volume_ratio, top.rsi, top.traded_value
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::candles_from_closes;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    struct ScriptedData {
        /// Per-instrument responses, consumed front to back; the last repeats.
        script: RefCell<HashMap<String, Vec<Result<Vec<Candle>, FetchError>>>>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedData {
        fn new(entries: Vec<(&str, Vec<Result<Vec<Candle>, FetchError>>)>) -> Self {
            ScriptedData {
                script: RefCell::new(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect(),
                ),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls_for(&self, instrument: &str) -> usize {
            self.calls.borrow().iter().filter(|c| *c == instrument).count()
        }
    }

    impl MarketDataPort for ScriptedData {
        fn fetch_candles(
            &self,
            instrument: &str,
            _count: usize,
            _interval: CandleInterval,
        ) -> Result<Vec<Candle>, FetchError> {
            self.calls.borrow_mut().push(instrument.to_string());
            let mut script = self.script.borrow_mut();
            let responses = script.get_mut(instrument).ok_or(FetchError::Unavailable {
                reason: "unknown".into(),
            })?;
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                responses[0].clone()
            }
        }

        fn list_instruments(&self) -> Result<Vec<String>, FetchError> {
            let mut names: Vec<String> = self.script.borrow().keys().cloned().collect();
            names.sort();
            Ok(names)
        }
    }

    fn unavailable() -> Result<Vec<Candle>, FetchError> {
        Err(FetchError::Unavailable {
            reason: "timeout".into(),
        })
    }

    fn request() -> DataRequest {
        DataRequest {
            retry: RetryPolicy {
                attempts: 3,
                interval: Duration::ZERO,
            },
            ..DataRequest::default()
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn retry_recovers_within_budget() {
        let port = ScriptedData::new(vec![(
            "A",
            vec![unavailable(), unavailable(), Ok(candles_from_closes(&[1.0]))],
        )]);
        let snapshot = collect_snapshot(&port, &names(&["A"]), &request()).unwrap();
        assert_eq!(snapshot.series.len(), 1);
        assert_eq!(port.calls_for("A"), 3);
    }

    #[test]
    fn skipped_after_three_attempts() {
        let port = ScriptedData::new(vec![
            ("A", vec![unavailable()]),
            ("B", vec![Ok(candles_from_closes(&[1.0]))]),
        ]);
        let snapshot = collect_snapshot(&port, &names(&["A", "B"]), &request()).unwrap();
        assert_eq!(port.calls_for("A"), 3);
        assert_eq!(snapshot.series.len(), 1);
        assert_eq!(
            snapshot.skipped,
            vec![SkippedInstrument {
                instrument: "A".into(),
                reason: SkipReason::DataUnavailable {
                    attempts: 3,
                    last_error: "timeout".into()
                }
            }]
        );
    }

    #[test]
    fn empty_treated_as_unavailable() {
        let port = ScriptedData::new(vec![("A", vec![Ok(vec![])])]);
        let snapshot = collect_snapshot(&port, &names(&["A"]), &request()).unwrap();
        assert!(snapshot.series.is_empty());
        assert_eq!(port.calls_for("A"), 3);
        assert_eq!(snapshot.skipped.len(), 1);
    }

    #[test]
    fn fatal_propagates_without_retry() {
        let port = ScriptedData::new(vec![(
            "A",
            vec![Err(FetchError::Fatal {
                reason: "corrupt".into(),
            })],
        )]);
        let err = collect_snapshot(&port, &names(&["A"]), &request()).unwrap_err();
        assert!(matches!(err, SignalError::DataFatal { ref instrument, .. } if instrument == "A"));
        assert_eq!(port.calls_for("A"), 1);
    }

    #[test]
    fn scan_skew_spans_fetch_times() {
        let port = ScriptedData::new(vec![
            ("A", vec![Ok(candles_from_closes(&[1.0]))]),
            ("B", vec![Ok(candles_from_closes(&[1.0]))]),
            ("C", vec![Ok(candles_from_closes(&[1.0]))]),
        ]);
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let tick = Cell::new(0i64);
        let clock = || {
            let t = tick.get();
            tick.set(t + 1);
            base + TimeDelta::seconds(t * 2)
        };

        let snapshot =
            collect_snapshot_with_clock(&port, &names(&["A", "B", "C"]), &request(), &clock)
                .unwrap();

        assert_eq!(snapshot.get("A").unwrap().fetched_at, base);
        assert_eq!(
            snapshot.get("C").unwrap().fetched_at,
            base + TimeDelta::seconds(4)
        );
        assert_eq!(snapshot.scan_skew(), TimeDelta::seconds(4));
    }

    #[test]
    fn empty_snapshot_has_no_skew() {
        assert_eq!(Snapshot::default().scan_skew(), TimeDelta::zero());
    }

    #[test]
    fn retry_policy_counts_attempts() {
        let policy = RetryPolicy {
            attempts: 0,
            interval: Duration::ZERO,
        };
        let (result, attempts) = policy.run("x", || -> Result<(), FetchError> { unavailable().map(|_| ()) });
        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }
}
