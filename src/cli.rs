//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::{CsvAdapter, CsvBalanceAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::analysis::InstrumentAnalysis;
use crate::domain::config_validation::{
    parse_threshold, parse_tiers, validate_data_config, validate_strategy_config,
};
use crate::domain::cycle::{
    run_cycle, CyclePorts, CycleReport, DataRequest, ExecutionMode, RetryPolicy, SkipReason,
    DEFAULT_CASH_ASSET,
};
use crate::domain::error::SignalError;
use crate::domain::execution::ExecutionStatus;
use crate::domain::indicator::IndicatorResult;
use crate::domain::ohlcv::CandleInterval;
use crate::domain::portfolio::Holdings;
use crate::domain::ranking::{RankingMode, VolumeTier, DEFAULT_MIN_SCORE};
use crate::domain::strategy::{ExitPolicy, SellRules, Strategy};
use crate::domain::universe::parse_instruments;
use crate::ports::balance_port::BalancePort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "surgetrader", about = "Candle-driven trading signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Overrides [logging] level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one decision cycle over CSV candles
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        balances: PathBuf,
        /// Comma-separated scan list; overrides [data] instruments
        #[arg(long)]
        instruments: Option<String>,
        /// Route orders to the paper broker
        #[arg(long)]
        execute: bool,
    },
    /// Show indicators and score for one instrument
    Score {
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        instrument: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Command::Evaluate { config, .. } | Command::Validate { config } => Some(config),
            Command::Score { config, .. } => config.as_ref(),
        }
    }
}

/// `--log-level`, else [logging] level, else `info`.
pub fn log_level(cli: &Cli) -> String {
    if let Some(level) = &cli.log_level {
        return level.clone();
    }
    cli.command
        .config_path()
        .and_then(|path| FileConfigAdapter::from_file(path).ok())
        .and_then(|config| config.get_string("logging", "level"))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Evaluate {
            config,
            data,
            balances,
            instruments,
            execute,
        } => run_evaluate(&config, data, balances, instruments.as_deref(), execute),
        Command::Score {
            data,
            instrument,
            config,
        } => run_score(data, &instrument, config.as_ref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = SignalError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: SignalError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn run_evaluate(
    config_path: &PathBuf,
    data_dir: PathBuf,
    balances_path: PathBuf,
    instruments: Option<&str>,
    execute: bool,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let strategy = match build_strategy(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let request = match build_data_request(&config, instruments) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    eprintln!(
        "Strategy: {} ({}, {} exit)",
        strategy.name, strategy.ranking, strategy.exit_policy
    );

    let market_data = CsvAdapter::new(data_dir);
    let balances = CsvBalanceAdapter::new(balances_path);
    let notifier = LogNotifier;

    let broker = if execute {
        match paper_broker(&market_data, &balances, &strategy, &request) {
            Ok(b) => b,
            Err(e) => return fail(e),
        }
    } else {
        PaperBroker::new(
            &Holdings::default(),
            HashMap::new(),
            strategy.limits,
            &request.cash_asset,
        )
    };

    let ports = CyclePorts {
        market_data: &market_data,
        balances: &balances,
        orders: &broker,
        notifier: &notifier,
    };
    let mode = if execute {
        ExecutionMode::Execute
    } else {
        ExecutionMode::DryRun
    };

    match run_cycle(&ports, &strategy, &request, mode) {
        Ok(report) => {
            print_report(&report);
            if execute {
                println!("cash after execution: {:.0}", broker.cash());
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Broker seeded with current balances and the latest close of every
/// instrument it may trade.
fn paper_broker(
    market_data: &CsvAdapter,
    balances: &CsvBalanceAdapter,
    strategy: &Strategy,
    request: &DataRequest,
) -> Result<PaperBroker, SignalError> {
    let holdings = Holdings::from_balances(&balances.read_balances()?, &request.cash_asset)?;

    let mut instruments = match &request.instruments {
        Some(listed) => listed.clone(),
        None => market_data
            .list_instruments()
            .map_err(|e| SignalError::DataFatal {
                instrument: "*".to_string(),
                reason: e.to_string(),
            })?,
    };
    instruments.extend(holdings.instruments().map(str::to_string));

    let prices = instruments
        .into_iter()
        .filter_map(|instrument| {
            let candles = market_data
                .fetch_candles(&instrument, 1, request.interval)
                .ok()?;
            let close = candles.last()?.close;
            Some((instrument, close))
        })
        .collect();

    Ok(PaperBroker::new(
        &holdings,
        prices,
        strategy.limits,
        &request.cash_asset,
    ))
}

fn print_report(report: &CycleReport) {
    println!(
        "universe: {} instrument(s), {} held, cash {:.0}",
        report.universe.count(),
        report.holdings.position_count(),
        report.holdings.cash
    );
    for skipped in &report.skipped {
        let SkipReason::DataUnavailable {
            attempts,
            last_error,
        } = &skipped.reason;
        println!(
            "SKIP {}: data unavailable after {} attempt(s): {}",
            skipped.instrument, attempts, last_error
        );
    }
    for decision in &report.decisions.decisions {
        println!("{decision}");
    }
    for outcome in &report.executions {
        match &outcome.status {
            ExecutionStatus::Filled(fill) => println!(
                "FILLED {} {}: {} @ {} (fee {:.2})",
                outcome.side, outcome.instrument, fill.quantity, fill.price, fill.fee
            ),
            ExecutionStatus::Failed(failure) => {
                println!("FAILED {} {}: {}", outcome.side, outcome.instrument, failure)
            }
        }
    }
    if report.scan_skew.num_milliseconds() > 0 {
        eprintln!(
            "scan skew: {} ms between first and last fetch",
            report.scan_skew.num_milliseconds()
        );
    }
}

fn run_score(data_dir: PathBuf, instrument: &str, config_path: Option<&PathBuf>) -> ExitCode {
    let config = match config_path {
        Some(path) => match load_config(path) {
            Ok(c) => Some(c),
            Err(code) => return code,
        },
        None => None,
    };
    let (strategy, request) = match &config {
        Some(c) => match build_strategy(c).and_then(|s| Ok((s, build_data_request(c, None)?))) {
            Ok(pair) => pair,
            Err(e) => return fail(e),
        },
        None => (Strategy::default(), DataRequest::default()),
    };

    let instrument = instrument.trim().to_uppercase();
    let market_data = CsvAdapter::new(data_dir);
    let candles = match market_data.fetch_candles(&instrument, request.candle_count, request.interval)
    {
        Ok(c) => c,
        Err(e) => {
            return fail(SignalError::DataFatal {
                instrument,
                reason: e.to_string(),
            });
        }
    };

    let Some(analysis) = InstrumentAnalysis::from_candles(
        &instrument,
        &candles,
        &strategy.indicators,
        &strategy.score_table,
    ) else {
        return fail(SignalError::DataFatal {
            instrument,
            reason: "no candles".to_string(),
        });
    };

    println!("{} ({} candles)", analysis.instrument, candles.len());
    println!("  price:        {}", analysis.current_price);
    println!("  traded value: {:.0}", analysis.traded_value);
    println!("  RSI:          {}", reading(analysis.rsi, 2));
    println!("  volume ratio: {}", reading(analysis.volume_ratio, 2));
    println!("  heikin-ashi:  {}", analysis.heikin_ashi);
    println!("  {}", analysis.score);
    ExitCode::SUCCESS
}

fn reading(value: IndicatorResult<f64>, precision: usize) -> String {
    match value {
        IndicatorResult::Defined(v) => format!("{v:.precision$}"),
        IndicatorResult::Undefined(reason) => format!("undefined ({reason})"),
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let strategy = match build_strategy(&config) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let request = match build_data_request(&config, None) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    println!("strategy:       {}", strategy.name);
    println!("ranking:        {}", strategy.ranking);
    println!("exit policy:    {}", strategy.exit_policy);
    println!("max candidates: {}", strategy.max_candidates);
    println!("max positions:  {}", strategy.max_positions);
    if !strategy.excluded.is_empty() {
        println!("excluded:       {}", strategy.excluded.join(", "));
    }
    println!(
        "orders:         min notional {}, fee reserve {}",
        strategy.limits.min_notional, strategy.limits.fee_reserve
    );
    match &request.instruments {
        Some(listed) => println!("instruments:    {}", listed.join(", ")),
        None => println!("instruments:    all files in the data directory"),
    }
    println!(
        "data:           {} x {} candles, {} attempt(s)",
        request.candle_count, request.interval, request.retry.attempts
    );
    eprintln!("Configuration OK");
    ExitCode::SUCCESS
}

/// The `[strategy] preset` (default `composite`) with every present key of
/// `[strategy]`, `[ranking]`, `[scoring]`, `[indicators]`, `[sell]` and
/// `[orders]` applied on top.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, SignalError> {
    validate_strategy_config(config)?;

    let preset = config
        .get_string("strategy", "preset")
        .unwrap_or_else(|| "composite".to_string());
    let mut strategy = Strategy::preset(&preset).ok_or_else(|| SignalError::ConfigInvalid {
        section: "strategy".into(),
        key: "preset".into(),
        reason: format!("unknown preset '{preset}'"),
    })?;

    if let Some(name) = config.get_string("strategy", "name") {
        strategy.name = name;
    }
    strategy.max_candidates =
        config.get_int("strategy", "max_candidates", strategy.max_candidates as i64) as usize;
    strategy.max_positions =
        config.get_int("strategy", "max_positions", strategy.max_positions as i64) as usize;
    if let Some(raw) = config.get_string("strategy", "exclude") {
        strategy.excluded = parse_instruments(&raw).map_err(|e| SignalError::ConfigInvalid {
            section: "strategy".into(),
            key: "exclude".into(),
            reason: e.to_string(),
        })?;
    }

    strategy.ranking = build_ranking(config, &strategy.ranking)?;
    apply_scoring(config, &mut strategy);
    apply_indicators(config, &mut strategy);
    strategy.exit_policy = build_exit_policy(config, &strategy.exit_policy)?;

    strategy.limits.min_notional =
        config.get_double("orders", "min_notional", strategy.limits.min_notional);
    strategy.limits.fee_reserve =
        config.get_double("orders", "fee_reserve", strategy.limits.fee_reserve);

    Ok(strategy)
}

fn build_ranking(config: &dyn ConfigPort, current: &RankingMode) -> Result<RankingMode, SignalError> {
    let composite = match config.get_string("ranking", "mode").as_deref() {
        Some(mode) => mode == "composite",
        None => matches!(current, RankingMode::CompositeScore { .. }),
    };

    if composite {
        let default = match current {
            RankingMode::CompositeScore { min_score } => *min_score,
            RankingMode::VolumeSurge { .. } => DEFAULT_MIN_SCORE,
        };
        return Ok(RankingMode::CompositeScore {
            min_score: config.get_double("ranking", "min_score", default),
        });
    }

    let tiers = match config.get_string("ranking", "tiers") {
        Some(raw) => parse_tiers(&raw).map_err(|reason| SignalError::ConfigInvalid {
            section: "ranking".into(),
            key: "tiers".into(),
            reason,
        })?,
        None => match current {
            RankingMode::VolumeSurge { tiers } => tiers.clone(),
            RankingMode::CompositeScore { .. } => VolumeTier::standard_tiers(),
        },
    };
    Ok(RankingMode::VolumeSurge { tiers })
}

fn apply_scoring(config: &dyn ConfigPort, strategy: &mut Strategy) {
    let t = &mut strategy.score_table;
    let get = |key: &str, current: f64| config.get_double("scoring", key, current);

    t.rsi_oversold = get("rsi_oversold", t.rsi_oversold);
    t.rsi_overbought = get("rsi_overbought", t.rsi_overbought);
    t.rsi_oversold_delta = get("rsi_oversold_delta", t.rsi_oversold_delta);
    t.rsi_overbought_delta = get("rsi_overbought_delta", t.rsi_overbought_delta);
    t.rsi_neutral_delta = get("rsi_neutral_delta", t.rsi_neutral_delta);
    t.macd_bullish_delta = get("macd_bullish_delta", t.macd_bullish_delta);
    t.macd_bearish_delta = get("macd_bearish_delta", t.macd_bearish_delta);
    t.macd_flat_delta = get("macd_flat_delta", t.macd_flat_delta);
    t.bollinger_low = get("bollinger_low", t.bollinger_low);
    t.bollinger_high = get("bollinger_high", t.bollinger_high);
    t.bollinger_low_delta = get("bollinger_low_delta", t.bollinger_low_delta);
    t.bollinger_high_delta = get("bollinger_high_delta", t.bollinger_high_delta);
    t.bollinger_mid_delta = get("bollinger_mid_delta", t.bollinger_mid_delta);
    t.trend_up_delta = get("trend_up_delta", t.trend_up_delta);
    t.trend_down_delta = get("trend_down_delta", t.trend_down_delta);
}

fn apply_indicators(config: &dyn ConfigPort, strategy: &mut Strategy) {
    let p = &mut strategy.indicators;
    let get = |key: &str, current: usize| config.get_int("indicators", key, current as i64) as usize;

    p.rsi_period = get("rsi_period", p.rsi_period);
    p.macd_fast = get("macd_fast", p.macd_fast);
    p.macd_slow = get("macd_slow", p.macd_slow);
    p.macd_signal = get("macd_signal", p.macd_signal);
    p.bollinger_period = get("bollinger_period", p.bollinger_period);
    p.ma_short = get("ma_short", p.ma_short);
    p.ma_long = get("ma_long", p.ma_long);
    p.volume_window = get("volume_window", p.volume_window);

    let mult = config.get_double("indicators", "bollinger_mult", p.bollinger_mult_x100 as f64 / 100.0);
    p.bollinger_mult_x100 = (mult * 100.0).round() as u32;
}

fn build_exit_policy(config: &dyn ConfigPort, current: &ExitPolicy) -> Result<ExitPolicy, SignalError> {
    let mut rules = match (config.get_string("sell", "policy").as_deref(), current) {
        (Some("forced_rotation"), _) | (None, ExitPolicy::ForcedRotation) => {
            return Ok(ExitPolicy::ForcedRotation);
        }
        (_, ExitPolicy::Standard(rules)) => rules.clone(),
        (_, ExitPolicy::ForcedRotation) => SellRules::default(),
    };

    let threshold = |key: &str, current: Option<f64>| -> Result<Option<f64>, SignalError> {
        match config.get_string("sell", key) {
            Some(raw) => parse_threshold(&raw).map_err(|reason| SignalError::ConfigInvalid {
                section: "sell".into(),
                key: key.into(),
                reason,
            }),
            None => Ok(current),
        }
    };
    rules.rsi_overbought = threshold("rsi_overbought", rules.rsi_overbought)?;
    rules.opportunity_ratio = threshold("opportunity_ratio", rules.opportunity_ratio)?;
    rules.min_profit_margin = threshold("min_profit_margin", rules.min_profit_margin)?;
    rules.score_floor = threshold("score_floor", rules.score_floor)?;
    rules.outscore_margin = threshold("outscore_margin", rules.outscore_margin)?;
    rules.heikin_ashi_reversal =
        config.get_bool("sell", "heikin_ashi_reversal", rules.heikin_ashi_reversal);

    Ok(ExitPolicy::Standard(rules))
}

/// `[data]` and `[orders] cash_asset`. `instruments` overrides the
/// configured scan list.
pub fn build_data_request(
    config: &dyn ConfigPort,
    instruments: Option<&str>,
) -> Result<DataRequest, SignalError> {
    validate_data_config(config)?;
    let defaults = DataRequest::default();

    let listed = match instruments {
        Some(raw) => Some(raw.to_string()),
        None => config.get_string("data", "instruments"),
    };
    let instruments = listed
        .map(|raw| {
            parse_instruments(&raw).map_err(|e| SignalError::ConfigInvalid {
                section: "data".into(),
                key: "instruments".into(),
                reason: e.to_string(),
            })
        })
        .transpose()?;

    let interval = match config.get_string("data", "interval") {
        Some(raw) => raw
            .parse::<CandleInterval>()
            .map_err(|e| SignalError::ConfigInvalid {
                section: "data".into(),
                key: "interval".into(),
                reason: e.to_string(),
            })?,
        None => defaults.interval,
    };

    let retry = RetryPolicy {
        attempts: config.get_int("data", "retry_attempts", defaults.retry.attempts as i64) as u32,
        interval: Duration::from_millis(config.get_int(
            "data",
            "retry_interval_ms",
            defaults.retry.interval.as_millis() as i64,
        ) as u64),
    };

    Ok(DataRequest {
        instruments,
        candle_count: config.get_int("data", "candle_count", defaults.candle_count as i64) as usize,
        interval,
        retry,
        cash_asset: config
            .get_string("orders", "cash_asset")
            .map(|s| s.to_uppercase())
            .unwrap_or_else(|| DEFAULT_CASH_ASSET.to_string()),
    })
}
