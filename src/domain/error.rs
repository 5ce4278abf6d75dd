//! Domain error types.

/// Top-level error type for surgetrader.
///
/// Everything that can end a cycle early. Per-instrument problems
/// (unavailable data, undefined indicators, rejected orders) are reported
/// inside the cycle instead.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("market data failure for {instrument}: {reason}")]
    DataFatal { instrument: String, reason: String },

    #[error("balance read failed: {reason}")]
    Balance { reason: String },

    #[error("invalid balance for {instrument}: {reason}")]
    InvalidBalance { instrument: String, reason: String },

    #[error("no instruments to evaluate")]
    NoInstruments,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&SignalError> for std::process::ExitCode {
    fn from(err: &SignalError) -> Self {
        let code: u8 = match err {
            SignalError::Io(_) => 1,
            SignalError::ConfigParse { .. }
            | SignalError::ConfigMissing { .. }
            | SignalError::ConfigInvalid { .. } => 2,
            SignalError::DataFatal { .. } | SignalError::NoInstruments => 3,
            SignalError::Balance { .. } | SignalError::InvalidBalance { .. } => 4,
        };
        std::process::ExitCode::from(code)
    }
}

/// Candle fetch failure at the market-data boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Transient; retried up to the configured attempt count.
    #[error("data unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("fatal data error: {reason}")]
    Fatal { reason: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Unavailable { .. })
    }
}

/// An order the venue (or paper broker) refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionFailure {
    #[error("order notional {notional:.2} not above minimum {minimum:.2}")]
    BelowMinimumNotional { notional: f64, minimum: f64 },

    #[error("insufficient balance for {instrument}: requested {requested}, available {available}")]
    InsufficientBalance {
        instrument: String,
        requested: f64,
        available: f64,
    },

    #[error("order rejected: {reason}")]
    Rejected { reason: String },
}
