//! Integration tests for the decision cycle.
//!
//! Tests cover:
//! - Volume-surge acceptance from raw candles through ranking and entry
//! - Buy gating on the minimum order notional
//! - Profit-target exit from candles and balances
//! - Forced rotation with execution ordering and notifications
//! - Bounded retry, skipped instruments and fatal data errors
//! - Scan skew across a snapshot
//! - Determinism of the decision step

mod common;

use approx::assert_relative_eq;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use common::*;
use std::cell::Cell;
use std::process::ExitCode;
use surgetrader::domain::analysis::InstrumentAnalysis;
use surgetrader::domain::cycle::{
    collect_snapshot_with_clock, run_cycle, CyclePorts, CycleReport, DataRequest, ExecutionMode,
    SkipReason,
};
use surgetrader::domain::decision::{
    decide, Action, CycleContext, HoldReason, OrderIntent, Rationale, SellTrigger,
};
use surgetrader::domain::error::{ExecutionFailure, FetchError, SignalError};
use surgetrader::domain::execution::OrderSide;
use surgetrader::domain::ranking::{rank, RejectReason};
use surgetrader::domain::strategy::Strategy;

const SURGE_BASE: f64 = 5_000_000.0;

fn cycle(
    data: &MockMarketData,
    balances: &MockBalances,
    orders: &MockOrders,
    notifier: &MockNotifier,
    strategy: &Strategy,
    request: &DataRequest,
    mode: ExecutionMode,
) -> Result<CycleReport, SignalError> {
    let ports = CyclePorts {
        market_data: data,
        balances,
        orders,
        notifier,
    };
    run_cycle(&ports, strategy, request, mode)
}

mod volume_surge_acceptance {
    use super::*;

    #[test]
    fn surge_candles_clear_the_top_tier() {
        let strategy = Strategy::volume_surge();
        let candles = surge_candles(SURGE_BASE);
        let analysis = InstrumentAnalysis::from_candles(
            "KRW-XRP",
            &candles,
            &strategy.indicators,
            &strategy.score_table,
        )
        .unwrap();

        assert_relative_eq!(analysis.rsi.defined().unwrap(), 15.0, epsilon = 1e-9);
        assert_relative_eq!(analysis.volume_ratio.defined().unwrap(), 30.0, epsilon = 1e-9);
        assert!(analysis.traded_value >= 1e9);

        let ranking = rank(
            std::slice::from_ref(&analysis),
            &strategy.ranking,
            strategy.max_candidates,
            &strategy.excluded,
        );
        assert_eq!(ranking.shortlist.len(), 1);
        assert_eq!(ranking.shortlist[0].instrument, "KRW-XRP");
        assert!(ranking.rejected.is_empty());
    }

    #[test]
    fn surge_becomes_buy_in_a_cycle() {
        let data = MockMarketData::new()
            .with_candles("KRW-XRP", surge_candles(SURGE_BASE))
            .with_candles("KRW-DOGE", oscillating_candles(30, 100.0, 101.0));
        let balances = MockBalances::new(1_000_000.0, &[]);

        let report = cycle(
            &data,
            &balances,
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::volume_surge(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        let buy = report.decisions.buy().unwrap();
        assert_eq!(buy.instrument, "KRW-XRP");
        assert_eq!(
            buy.order,
            Some(OrderIntent::Buy {
                notional: 1_000_000.0 * 0.9995
            })
        );
        let doge = report.decisions.for_instrument("KRW-DOGE").unwrap();
        assert!(matches!(
            doge.hold_reason(),
            Some(HoldReason::Rejected(RejectReason::VolumeRatioTooLow { .. }))
        ));
    }

    #[test]
    fn loose_preset_never_picks_excluded_majors() {
        let data = MockMarketData::new()
            .with_candles("KRW-BTC", surge_candles(SURGE_BASE))
            .with_candles("KRW-XRP", oscillating_candles(30, 100.0, 101.0));
        let report = cycle(
            &data,
            &MockBalances::new(1_000_000.0, &[]),
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::volume_surge_loose(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        assert_eq!(report.universe.instruments, names(&["KRW-XRP"]));
        assert!(report.decisions.buy().is_none());
    }
}

mod buy_gating {
    use super::*;

    fn decision_with_cash(cash: f64) -> Action {
        let data = MockMarketData::new().with_candles("KRW-XRP", surge_candles(SURGE_BASE));
        let report = cycle(
            &data,
            &MockBalances::new(cash, &[]),
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::volume_surge(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();
        report.decisions.for_instrument("KRW-XRP").unwrap().action
    }

    #[test]
    fn cash_just_below_gate_holds() {
        // 5002 × 0.9995 = 4999.499
        assert_eq!(decision_with_cash(5002.0), Action::Hold);
    }

    #[test]
    fn cash_above_gate_buys() {
        assert_eq!(decision_with_cash(6000.0), Action::Buy);
    }

    #[test]
    fn gate_at_minimum_follows_strict_rule() {
        let strategy = Strategy::volume_surge();
        let cash = strategy.limits.min_notional / strategy.limits.fee_reserve;
        let expected = if cash * strategy.limits.fee_reserve > strategy.limits.min_notional {
            Action::Buy
        } else {
            Action::Hold
        };
        assert_eq!(decision_with_cash(cash), expected);
    }
}

mod profit_target_exit {
    use super::*;

    #[test]
    fn six_percent_gain_sells_on_profit_alone() {
        // RSI 50, no score (too few candles for MACD), no competitor.
        let data =
            MockMarketData::new().with_candles("KRW-XRP", oscillating_candles(22, 104.0, 106.0));
        let balances = MockBalances::new(0.0, &[("KRW-XRP", 100.0, 100.0)]);

        let report = cycle(
            &data,
            &balances,
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::composite(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        let d = report.decisions.for_instrument("KRW-XRP").unwrap();
        assert_eq!(d.action, Action::Sell);
        assert_eq!(d.order, Some(OrderIntent::Sell { quantity: 100.0 }));
        assert_eq!(d.sell_triggers().len(), 1);
        assert!(matches!(
            d.sell_triggers()[0],
            SellTrigger::ProfitTarget { margin, .. } if margin == 0.05
        ));
    }

    #[test]
    fn small_gain_holds() {
        let data =
            MockMarketData::new().with_candles("KRW-XRP", oscillating_candles(22, 102.0, 103.0));
        let balances = MockBalances::new(0.0, &[("KRW-XRP", 100.0, 100.0)]);

        let report = cycle(
            &data,
            &balances,
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::composite(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        let d = report.decisions.for_instrument("KRW-XRP").unwrap();
        assert_eq!(d.hold_reason(), Some(&HoldReason::NoSellTrigger));
    }
}

mod forced_rotation {
    use super::*;

    fn rotation_data() -> MockMarketData {
        MockMarketData::new()
            .with_candles("KRW-A", oscillating_candles(22, 100.0, 101.0))
            .with_candles("KRW-B", oscillating_candles(22, 100.0, 101.0))
            .with_candles("KRW-C", surge_candles(SURGE_BASE))
    }

    fn rotation_balances() -> MockBalances {
        MockBalances::new(100_000.0, &[("KRW-A", 100.0, 100.0), ("KRW-B", 100.0, 100.0)])
    }

    #[test]
    fn sells_both_holdings_and_buys_target() {
        let report = cycle(
            &rotation_data(),
            &rotation_balances(),
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::forced_rotation(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        let actions: Vec<(&str, Action)> = report
            .decisions
            .decisions
            .iter()
            .map(|d| (d.instrument.as_str(), d.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("KRW-A", Action::Sell),
                ("KRW-B", Action::Sell),
                ("KRW-C", Action::Buy),
            ]
        );
        for held in ["KRW-A", "KRW-B"] {
            let d = report.decisions.for_instrument(held).unwrap();
            assert_eq!(
                d.rationale,
                Rationale::Exit(vec![SellTrigger::Rotation {
                    target: "KRW-C".to_string()
                }])
            );
        }
    }

    #[test]
    fn execution_sends_sells_before_buy() {
        let orders = MockOrders::new()
            .with_price("KRW-A", 101.0)
            .with_price("KRW-B", 101.0)
            .with_price("KRW-C", SURGE_BASE * 0.86);
        let notifier = MockNotifier::default();

        let report = cycle(
            &rotation_data(),
            &rotation_balances(),
            &orders,
            &notifier,
            &Strategy::forced_rotation(),
            &fast_request(),
            ExecutionMode::Execute,
        )
        .unwrap();

        assert_eq!(
            orders.placed(),
            vec![
                (OrderSide::Sell, "KRW-A".to_string()),
                (OrderSide::Sell, "KRW-B".to_string()),
                (OrderSide::Buy, "KRW-C".to_string()),
            ]
        );
        assert_eq!(report.executions.len(), 3);
        assert!(report.executions.iter().all(|e| e.is_filled()));
        assert_eq!(notifier.messages().len(), 3);
        assert!(notifier.messages()[2].starts_with("buy KRW-C:"));
    }

    #[test]
    fn failed_order_is_reported_and_announced() {
        let orders = MockOrders::new().rejecting("KRW-B");
        let notifier = MockNotifier::default();

        let report = cycle(
            &rotation_data(),
            &rotation_balances(),
            &orders,
            &notifier,
            &Strategy::forced_rotation(),
            &fast_request(),
            ExecutionMode::Execute,
        )
        .unwrap();

        let failed: Vec<&str> = report
            .executions
            .iter()
            .filter(|e| !e.is_filled())
            .map(|e| e.instrument.as_str())
            .collect();
        assert_eq!(failed, vec!["KRW-B"]);
        assert!(notifier.messages().iter().any(|m| m.contains("KRW-B failed")));

        let b = report.decisions.for_instrument("KRW-B").unwrap();
        assert_eq!(b.action, Action::Hold);
        assert_eq!(b.order, None);
        assert!(matches!(
            b.hold_reason(),
            Some(HoldReason::ExecutionFailed(ExecutionFailure::Rejected { .. }))
        ));
        assert_eq!(report.decisions.for_instrument("KRW-A").unwrap().action, Action::Sell);
        assert_eq!(report.decisions.buy().unwrap().instrument, "KRW-C");
    }

    #[test]
    fn dry_run_sends_summary_only() {
        let orders = MockOrders::new();
        let notifier = MockNotifier::default();

        let report = cycle(
            &rotation_data(),
            &rotation_balances(),
            &orders,
            &notifier,
            &Strategy::forced_rotation(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        assert!(report.executions.is_empty());
        assert!(orders.placed().is_empty());
        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("forced_rotation: 1 buy, 2 sell signal(s) (dry run)"));
        assert!(messages[0].contains("top KRW-C: volume ratio 30.00x"));
    }
}

mod data_retrieval {
    use super::*;

    fn unavailable() -> FetchError {
        FetchError::Unavailable {
            reason: "timeout".to_string(),
        }
    }

    #[test]
    fn recovers_within_retry_budget() {
        let data = MockMarketData::new()
            .with_candles("KRW-XRP", surge_candles(SURGE_BASE))
            .with_failures("KRW-XRP", 2, unavailable());

        let report = cycle(
            &data,
            &MockBalances::new(100_000.0, &[]),
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::volume_surge(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        assert_eq!(data.calls("KRW-XRP"), 3);
        assert!(report.skipped.is_empty());
        assert_eq!(report.decisions.buy().unwrap().instrument, "KRW-XRP");
    }

    #[test]
    fn skipped_after_three_attempts_others_proceed() {
        let data = MockMarketData::new()
            .with_candles("KRW-DOGE", surge_candles(SURGE_BASE))
            .with_candles("KRW-XRP", surge_candles(SURGE_BASE))
            .with_failures("KRW-DOGE", 5, unavailable());

        let report = cycle(
            &data,
            &MockBalances::new(100_000.0, &[]),
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::volume_surge(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        assert_eq!(data.calls("KRW-DOGE"), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].instrument, "KRW-DOGE");
        assert_eq!(
            report.skipped[0].reason,
            SkipReason::DataUnavailable {
                attempts: 3,
                last_error: "timeout".to_string()
            }
        );
        assert!(report.decisions.for_instrument("KRW-DOGE").is_none());
        assert_eq!(report.decisions.buy().unwrap().instrument, "KRW-XRP");
    }

    #[test]
    fn skipped_holding_keeps_its_slot() {
        let data = MockMarketData::new()
            .with_candles("KRW-XRP", surge_candles(SURGE_BASE))
            .with_failures("KRW-SOL", 3, unavailable());
        let balances = MockBalances::new(100_000.0, &[("KRW-SOL", 100.0, 100.0)]);

        let report = cycle(
            &data,
            &balances,
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::volume_surge(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap();

        let d = report.decisions.for_instrument("KRW-XRP").unwrap();
        assert_eq!(d.hold_reason(), Some(&HoldReason::SlotsFull { held: 1, max: 1 }));
    }

    #[test]
    fn fatal_error_aborts_the_cycle() {
        let data = MockMarketData::new()
            .with_candles("KRW-XRP", surge_candles(SURGE_BASE))
            .with_failures(
                "KRW-XRP",
                1,
                FetchError::Fatal {
                    reason: "bad header".to_string(),
                },
            );

        let err = cycle(
            &data,
            &MockBalances::new(100_000.0, &[]),
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::volume_surge(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap_err();

        assert_eq!(data.calls("KRW-XRP"), 1);
        assert!(matches!(err, SignalError::DataFatal { ref instrument, .. } if instrument == "KRW-XRP"));
        assert_eq!(ExitCode::from(&err), ExitCode::from(3));
    }

    #[test]
    fn empty_universe_is_an_error() {
        let err = cycle(
            &MockMarketData::new(),
            &MockBalances::new(100_000.0, &[]),
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::composite(),
            &fast_request(),
            ExecutionMode::DryRun,
        )
        .unwrap_err();
        assert!(matches!(err, SignalError::NoInstruments));
    }

    #[test]
    fn configured_list_overrides_listing() {
        let data = MockMarketData::new()
            .with_candles("KRW-XRP", surge_candles(SURGE_BASE))
            .with_candles("KRW-DOGE", surge_candles(SURGE_BASE));
        let request = DataRequest {
            instruments: Some(names(&["KRW-DOGE"])),
            ..fast_request()
        };

        let report = cycle(
            &data,
            &MockBalances::new(100_000.0, &[]),
            &MockOrders::new(),
            &MockNotifier::default(),
            &Strategy::volume_surge(),
            &request,
            ExecutionMode::DryRun,
        )
        .unwrap();

        assert_eq!(report.universe.instruments, names(&["KRW-DOGE"]));
        assert_eq!(data.calls("KRW-XRP"), 0);
    }
}

mod staleness {
    use super::*;

    #[test]
    fn skew_spans_first_to_last_fetch() {
        let data = MockMarketData::new()
            .with_candles("KRW-A", oscillating_candles(22, 100.0, 101.0))
            .with_candles("KRW-B", oscillating_candles(22, 100.0, 101.0))
            .with_candles("KRW-C", oscillating_candles(22, 100.0, 101.0));
        let tick = Cell::new(0i64);
        let clock = || -> DateTime<Utc> {
            let t = tick.get();
            tick.set(t + 2);
            Utc.timestamp_opt(1_700_000_000 + t, 0).unwrap()
        };

        let snapshot = collect_snapshot_with_clock(
            &data,
            &names(&["KRW-A", "KRW-B", "KRW-C"]),
            &fast_request(),
            &clock,
        )
        .unwrap();

        assert_eq!(snapshot.series.len(), 3);
        assert_eq!(snapshot.scan_skew(), TimeDelta::seconds(4));
        assert!(snapshot.get("KRW-A").unwrap().fetched_at < snapshot.get("KRW-C").unwrap().fetched_at);
    }
}

mod determinism {
    use super::*;
    use proptest::prelude::*;
    use surgetrader::domain::heikin_ashi::HeikinAshiSignal;
    use surgetrader::domain::indicator::IndicatorResult;
    use surgetrader::domain::portfolio::Holdings;
    use surgetrader::domain::position::Position;
    use surgetrader::domain::scoring::ScoreOutcome;

    fn analyses_from(raw: &[(f64, f64, f64, f64, bool)]) -> (Vec<InstrumentAnalysis>, Holdings) {
        let mut holdings = Holdings::new(50_000.0);
        let analyses = raw
            .iter()
            .enumerate()
            .map(|(i, &(ratio, rsi, value, price, held))| {
                let instrument = format!("KRW-T{i}");
                if held {
                    holdings.add_position(Position {
                        instrument: instrument.clone(),
                        entry_price: 100.0,
                        quantity: 100.0,
                    });
                }
                InstrumentAnalysis {
                    instrument,
                    current_price: price,
                    traded_value: value,
                    rsi: IndicatorResult::Defined(rsi),
                    volume_ratio: IndicatorResult::Defined(ratio),
                    score: ScoreOutcome::InsufficientData { missing: vec![] },
                    heikin_ashi: HeikinAshiSignal::Hold,
                }
            })
            .collect();
        (analyses, holdings)
    }

    proptest! {
        #[test]
        fn same_inputs_same_decisions(
            raw in prop::collection::vec(
                (0.0f64..40.0, 0.0f64..100.0, 0.0f64..3e9, 1.0f64..500.0, any::<bool>()),
                1..8,
            ),
            rotation in any::<bool>(),
        ) {
            let strategy = if rotation { Strategy::forced_rotation() } else { Strategy::volume_surge() };
            let (analyses, holdings) = analyses_from(&raw);
            let ctx = CycleContext { strategy: &strategy, analyses: &analyses, holdings: &holdings };

            let first = decide(&ctx);
            let second = decide(&ctx);
            prop_assert_eq!(&first, &second);

            prop_assert_eq!(first.decisions.len(), analyses.len());
            for (d, a) in first.decisions.iter().zip(&analyses) {
                prop_assert_eq!(&d.instrument, &a.instrument);
                if d.action == Action::Sell {
                    prop_assert!(holdings.has_position(&d.instrument));
                }
                if d.action == Action::Buy {
                    prop_assert!(!holdings.has_position(&d.instrument));
                }
            }
            prop_assert!(first.with_action(Action::Buy).count() <= 1);
        }
    }
}
