//! CSV file adapters for candles and balances.
//!
//! Candles live in `<dir>/<instrument>.csv` with the header
//! `timestamp,open,high,low,close,volume`. A directory holds one candle
//! interval; the requested interval is not checked against the files.
//! Balances live in a single file with the header
//! `instrument,quantity,entry_price`.

use crate::domain::error::{FetchError, SignalError};
use crate::domain::ohlcv::{Candle, CandleInterval};
use crate::domain::position::BalanceEntry;
use crate::ports::balance_port::BalancePort;
use crate::ports::data_port::MarketDataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", instrument))
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_candles(
        &self,
        instrument: &str,
        count: usize,
        _interval: CandleInterval,
    ) -> Result<Vec<Candle>, FetchError> {
        let path = self.csv_path(instrument);
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FetchError::Unavailable {
                reason: format!("{} not found", path.display()),
            },
            _ => FetchError::Fatal {
                reason: format!("failed to read {}: {}", path.display(), e),
            },
        })?;

        let mut candles = parse_candles(&content).map_err(|reason| FetchError::Fatal {
            reason: format!("{}: {}", path.display(), reason),
        })?;

        candles.sort_by_key(|c| c.timestamp);
        let skip = candles.len().saturating_sub(count);
        Ok(candles.split_off(skip))
    }

    fn list_instruments(&self) -> Result<Vec<String>, FetchError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| FetchError::Fatal {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut instruments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FetchError::Fatal {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(instrument) = name_str.strip_suffix(".csv") {
                instruments.push(instrument.to_string());
            }
        }

        instruments.sort();
        Ok(instruments)
    }
}

fn parse_candles(content: &str) -> Result<Vec<Candle>, String> {
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut candles = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| format!("CSV parse error: {}", e))?;
        let line = row + 2;

        let raw_ts = record
            .get(0)
            .ok_or_else(|| format!("line {line}: missing timestamp column"))?;
        let timestamp = parse_timestamp(raw_ts.trim())
            .ok_or_else(|| format!("line {line}: invalid timestamp '{raw_ts}'"))?;

        candles.push(Candle {
            timestamp,
            open: number(&record, 1, "open", line)?,
            high: number(&record, 2, "high", line)?,
            low: number(&record, 3, "low", line)?,
            close: number(&record, 4, "close", line)?,
            volume: number(&record, 5, "volume", line)?,
        });
    }

    Ok(candles)
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn number(record: &csv::StringRecord, idx: usize, column: &str, line: usize) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .ok_or_else(|| format!("line {line}: missing {column} column"))?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("line {line}: invalid {column} value '{raw}'"))
}

pub struct CsvBalanceAdapter {
    path: PathBuf,
}

impl CsvBalanceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl BalancePort for CsvBalanceAdapter {
    fn read_balances(&self) -> Result<Vec<BalanceEntry>, SignalError> {
        let content = fs::read_to_string(&self.path).map_err(|e| SignalError::Balance {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut entries = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let line = row + 2;
            let record = result.map_err(|e| SignalError::Balance {
                reason: format!("CSV parse error: {}", e),
            })?;
            let instrument = record
                .get(0)
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| SignalError::Balance {
                    reason: format!("line {line}: missing instrument"),
                })?;
            let quantity = number(&record, 1, "quantity", line)
                .map_err(|reason| SignalError::Balance { reason })?;
            // Cash rows may leave entry_price blank.
            let entry_price = match record.get(2).map(str::trim) {
                None | Some("") => 0.0,
                Some(_) => number(&record, 2, "entry_price", line)
                    .map_err(|reason| SignalError::Balance { reason })?,
            };
            entries.push(BalanceEntry {
                instrument,
                quantity,
                entry_price,
            });
        }

        Ok(entries)
    }
}
