//! Configuration validation.
//!
//! Every key is optional (presets supply defaults), but a key that is
//! present must parse and fall in range. Strategy building assumes these
//! checks have passed.

use crate::domain::error::SignalError;
use crate::domain::ohlcv::CandleInterval;
use crate::domain::ranking::VolumeTier;
use crate::domain::scoring::{IndicatorParams, ScoreTable};
use crate::domain::strategy::PRESET_NAMES;
use crate::domain::universe::parse_instruments;
use crate::ports::config_port::ConfigPort;
use std::str::FromStr;

pub const RANKING_MODES: [&str; 2] = ["composite", "volume_surge"];
pub const SELL_POLICIES: [&str; 2] = ["standard", "forced_rotation"];

pub const INDICATOR_PERIOD_KEYS: [&str; 8] = [
    "rsi_period",
    "macd_fast",
    "macd_slow",
    "macd_signal",
    "bollinger_period",
    "ma_short",
    "ma_long",
    "volume_window",
];

pub const SCORE_DELTA_KEYS: [&str; 11] = [
    "rsi_oversold_delta",
    "rsi_overbought_delta",
    "rsi_neutral_delta",
    "macd_bullish_delta",
    "macd_bearish_delta",
    "macd_flat_delta",
    "bollinger_low_delta",
    "bollinger_high_delta",
    "bollinger_mid_delta",
    "trend_up_delta",
    "trend_down_delta",
];

pub const SELL_THRESHOLD_KEYS: [&str; 5] = [
    "rsi_overbought",
    "opportunity_ratio",
    "min_profit_margin",
    "score_floor",
    "outscore_margin",
];

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SignalError> {
    validate_preset(config)?;
    validate_counts(config)?;
    validate_ranking(config)?;
    validate_scoring(config)?;
    validate_indicators(config)?;
    validate_sell_rules(config)?;
    validate_orders(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SignalError> {
    if let Some(count) = parsed::<i64>(config, "data", "candle_count")?
        && count < 1
    {
        return Err(invalid("data", "candle_count", "candle_count must be at least 1"));
    }
    if let Some(raw) = config.get_string("data", "interval") {
        raw.parse::<CandleInterval>()
            .map_err(|e| invalid("data", "interval", &e.to_string()))?;
    }
    if let Some(attempts) = parsed::<i64>(config, "data", "retry_attempts")?
        && attempts < 1
    {
        return Err(invalid("data", "retry_attempts", "retry_attempts must be at least 1"));
    }
    if let Some(ms) = parsed::<i64>(config, "data", "retry_interval_ms")?
        && ms < 0
    {
        return Err(invalid(
            "data",
            "retry_interval_ms",
            "retry_interval_ms must be non-negative",
        ));
    }
    if let Some(raw) = config.get_string("data", "instruments") {
        parse_instruments(&raw).map_err(|e| invalid("data", "instruments", &e.to_string()))?;
    }
    Ok(())
}

/// `"1e9:3:30, 1e8:4:25, 0:5:20"` → tiers of
/// `min_traded_value:min_volume_ratio:max_rsi`.
pub fn parse_tiers(input: &str) -> Result<Vec<VolumeTier>, String> {
    let mut tiers: Vec<VolumeTier> = Vec::new();

    for token in input.split(',') {
        let parts: Vec<&str> = token.split(':').map(str::trim).collect();
        let [value, ratio, rsi] = parts[..] else {
            return Err(format!(
                "tier '{}' must be min_traded_value:min_volume_ratio:max_rsi",
                token.trim()
            ));
        };
        let number = |s: &str| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("'{s}' is not a number"))
        };
        let tier = VolumeTier::new(number(value)?, number(ratio)?, number(rsi)?);

        if tier.min_traded_value < 0.0 || tier.min_volume_ratio < 0.0 {
            return Err(format!("tier '{}' has a negative bound", token.trim()));
        }
        if tier.max_rsi <= 0.0 || tier.max_rsi > 100.0 {
            return Err(format!("tier '{}' max RSI must be in (0, 100]", token.trim()));
        }
        if tiers
            .iter()
            .any(|t| t.min_traded_value == tier.min_traded_value)
        {
            return Err(format!(
                "duplicate tier floor {}",
                tier.min_traded_value
            ));
        }
        tiers.push(tier);
    }

    Ok(tiers)
}

/// A sell threshold; `off` or `none` disables the rule.
pub fn parse_threshold(input: &str) -> Result<Option<f64>, String> {
    let trimmed = input.trim();
    if matches!(
        trimmed.to_ascii_lowercase().as_str(),
        "off" | "none" | "disabled"
    ) {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(Some)
        .ok_or_else(|| format!("'{trimmed}' must be a non-negative number or 'off'"))
}

fn validate_preset(config: &dyn ConfigPort) -> Result<(), SignalError> {
    if let Some(preset) = config.get_string("strategy", "preset")
        && !PRESET_NAMES.contains(&preset.trim())
    {
        return Err(invalid(
            "strategy",
            "preset",
            &format!("unknown preset '{preset}' (expected one of {})", PRESET_NAMES.join(", ")),
        ));
    }
    Ok(())
}

fn validate_counts(config: &dyn ConfigPort) -> Result<(), SignalError> {
    if let Some(n) = parsed::<i64>(config, "strategy", "max_candidates")?
        && n < 1
    {
        return Err(invalid("strategy", "max_candidates", "max_candidates must be at least 1"));
    }
    if let Some(n) = parsed::<i64>(config, "strategy", "max_positions")?
        && n < 1
    {
        return Err(invalid("strategy", "max_positions", "max_positions must be at least 1"));
    }
    if let Some(raw) = config.get_string("strategy", "exclude")
        && !raw.trim().is_empty()
    {
        parse_instruments(&raw).map_err(|e| invalid("strategy", "exclude", &e.to_string()))?;
    }
    Ok(())
}

fn validate_ranking(config: &dyn ConfigPort) -> Result<(), SignalError> {
    if let Some(mode) = config.get_string("ranking", "mode")
        && !RANKING_MODES.contains(&mode.trim())
    {
        return Err(invalid(
            "ranking",
            "mode",
            &format!("unknown ranking mode '{mode}'"),
        ));
    }
    if let Some(min_score) = parsed::<f64>(config, "ranking", "min_score")?
        && !(0.0..=100.0).contains(&min_score)
    {
        return Err(invalid("ranking", "min_score", "min_score must be between 0 and 100"));
    }
    if let Some(raw) = config.get_string("ranking", "tiers") {
        parse_tiers(&raw).map_err(|reason| invalid("ranking", "tiers", &reason))?;
    }
    Ok(())
}

fn validate_scoring(config: &dyn ConfigPort) -> Result<(), SignalError> {
    for key in SCORE_DELTA_KEYS {
        parsed::<f64>(config, "scoring", key)?;
    }

    let defaults = ScoreTable::default();
    let oversold = parsed::<f64>(config, "scoring", "rsi_oversold")?.unwrap_or(defaults.rsi_oversold);
    let overbought =
        parsed::<f64>(config, "scoring", "rsi_overbought")?.unwrap_or(defaults.rsi_overbought);
    if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
        return Err(invalid("scoring", "rsi_oversold", "RSI thresholds must be between 0 and 100"));
    }
    if oversold >= overbought {
        return Err(invalid(
            "scoring",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }

    let low = parsed::<f64>(config, "scoring", "bollinger_low")?.unwrap_or(defaults.bollinger_low);
    let high = parsed::<f64>(config, "scoring", "bollinger_high")?.unwrap_or(defaults.bollinger_high);
    if low >= high {
        return Err(invalid(
            "scoring",
            "bollinger_low",
            "bollinger_low must be below bollinger_high",
        ));
    }
    Ok(())
}

fn validate_indicators(config: &dyn ConfigPort) -> Result<(), SignalError> {
    for key in INDICATOR_PERIOD_KEYS {
        if let Some(period) = parsed::<i64>(config, "indicators", key)?
            && period < 1
        {
            return Err(invalid("indicators", key, &format!("{key} must be at least 1")));
        }
    }

    let defaults = IndicatorParams::default();
    let period = |key: &str, default: usize| -> Result<i64, SignalError> {
        Ok(parsed::<i64>(config, "indicators", key)?.unwrap_or(default as i64))
    };
    if period("macd_fast", defaults.macd_fast)? >= period("macd_slow", defaults.macd_slow)? {
        return Err(invalid("indicators", "macd_fast", "macd_fast must be below macd_slow"));
    }
    if period("ma_short", defaults.ma_short)? >= period("ma_long", defaults.ma_long)? {
        return Err(invalid("indicators", "ma_short", "ma_short must be below ma_long"));
    }

    if let Some(mult) = parsed::<f64>(config, "indicators", "bollinger_mult")?
        && mult <= 0.0
    {
        return Err(invalid("indicators", "bollinger_mult", "bollinger_mult must be positive"));
    }
    Ok(())
}

fn validate_sell_rules(config: &dyn ConfigPort) -> Result<(), SignalError> {
    if let Some(policy) = config.get_string("sell", "policy")
        && !SELL_POLICIES.contains(&policy.trim())
    {
        return Err(invalid("sell", "policy", &format!("unknown sell policy '{policy}'")));
    }
    for key in SELL_THRESHOLD_KEYS {
        if let Some(raw) = config.get_string("sell", key) {
            parse_threshold(&raw).map_err(|reason| invalid("sell", key, &reason))?;
        }
    }
    Ok(())
}

fn validate_orders(config: &dyn ConfigPort) -> Result<(), SignalError> {
    if let Some(min_notional) = parsed::<f64>(config, "orders", "min_notional")?
        && min_notional < 0.0
    {
        return Err(invalid("orders", "min_notional", "min_notional must be non-negative"));
    }
    if let Some(reserve) = parsed::<f64>(config, "orders", "fee_reserve")?
        && (reserve <= 0.0 || reserve > 1.0)
    {
        return Err(invalid("orders", "fee_reserve", "fee_reserve must be in (0, 1]"));
    }
    if let Some(cash) = config.get_string("orders", "cash_asset")
        && cash.trim().is_empty()
    {
        return Err(invalid("orders", "cash_asset", "cash_asset must not be empty"));
    }
    Ok(())
}

/// `Ok(None)` when the key is absent.
fn parsed<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, SignalError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("'{raw}' is not a valid {key}"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> SignalError {
    SignalError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
