//! Staking errors

use stakelot_core::{Amount, CoreError};
use thiserror::Error;

/// Result type alias for staking operations
pub type Result<T> = std::result::Result<T, StakeError>;

/// Errors raised by the staking pool, reward ledger and scheduler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakeError {
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Insufficient stake: requested {requested}, available {available}")]
    InsufficientStake { requested: Amount, available: Amount },

    #[error("Staking is paused")]
    Paused,

    #[error("Insufficient reward pool: need {required}, have {available}")]
    InsufficientRewardPool { required: Amount, available: Amount },

    #[error("Initial strategy already set")]
    InitialStrategyAlreadySet,

    #[error("Initial strategy not set")]
    InitialStrategyNotSet,

    #[error("Strategy start {start} must be after current position {now}")]
    StartNotInFuture { start: u64, now: u64 },

    #[error("Initial strategy starts at {start}, current position {now}")]
    StrategyNotStarted { start: u64, now: u64 },

    #[error("Duration must be greater than zero")]
    ZeroDuration,

    #[error("Duration {duration} exceeds maximum {max}")]
    DurationTooLong { duration: u64, max: u64 },

    #[error("Invalid fee schedule: {0}")]
    InvalidFeeSchedule(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StakeError {
    /// Stable numeric code for reporting
    pub fn code(&self) -> u32 {
        match self {
            Self::ZeroAmount => 2001,
            Self::InsufficientStake { .. } => 2002,
            Self::Paused => 2003,
            Self::InsufficientRewardPool { .. } => 2004,
            Self::InitialStrategyAlreadySet
            | Self::InitialStrategyNotSet
            | Self::StartNotInFuture { .. }
            | Self::StrategyNotStarted { .. } => 2101,
            Self::ZeroDuration | Self::DurationTooLong { .. } => 2102,
            Self::InvalidFeeSchedule(_) => 2201,
            Self::Core(inner) => inner.code(),
        }
    }

    /// Whether the same call can succeed later without changing its arguments
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Paused | Self::InsufficientRewardPool { .. } | Self::StrategyNotStarted { .. } => {
                true
            }
            Self::Core(inner) => inner.is_recoverable(),
            _ => false,
        }
    }
}
