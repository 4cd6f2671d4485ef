//! Simulator errors

use stakelot_core::CoreError;
use stakelot_economics::StakeError;
use stakelot_lottery::{LotteryError, OracleError};
use thiserror::Error;

/// Result type alias for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Invalid genesis time: {0}")]
    Genesis(#[from] chrono::ParseError),

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    #[error("Scenario error: {0}")]
    Scenario(String),

    #[error(transparent)]
    Stake(#[from] StakeError),

    #[error(transparent)]
    Lottery(#[from] LotteryError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SimError {
    /// Numeric code of the underlying failure; harness failures share 9000
    pub fn code(&self) -> u32 {
        match self {
            Self::Stake(e) => e.code(),
            Self::Lottery(e) => e.code(),
            Self::Oracle(OracleError::NotOperator(_)) => 3302,
            Self::Oracle(_) => 3301,
            Self::Core(e) => e.code(),
            _ => 9000,
        }
    }

    /// Whether the transaction itself was rejected, as opposed to the harness failing
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Stake(_) | Self::Lottery(_) | Self::Oracle(_) | Self::Core(_) | Self::UnknownToken(_)
        )
    }
}
