//! Lottery and oracle errors

use crate::lottery::LotteryState;
use crate::oracle::RequestId;
use stakelot_core::{Address, CoreError};
use thiserror::Error;

/// Result type alias for lottery operations
pub type Result<T> = std::result::Result<T, LotteryError>;

/// Random number oracle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Unknown request: {0}")]
    UnknownRequest(RequestId),

    #[error("Request already fulfilled: {0}")]
    AlreadyFulfilled(RequestId),

    /// Results read before fulfilment
    #[error("Request not ready: {0}")]
    NotReady(RequestId),

    #[error("Wrong number count: expected {expected}, got {got}")]
    WrongCount { expected: usize, got: usize },

    #[error("Request must ask for at least one number")]
    ZeroCount,

    /// Fulfilment sent by someone other than the oracle operator
    #[error("{0} is not the oracle operator")]
    NotOperator(Address),
}

/// Lottery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LotteryError {
    #[error("Lottery is {actual:?}, expected {expected:?}")]
    WrongState {
        expected: LotteryState,
        actual: LotteryState,
    },

    #[error("Ticket sales are closed")]
    SalesClosed,

    #[error("Ticket count must be greater than zero")]
    ZeroTickets,

    #[error("Ticket cap of {cap} per player exceeded: holds {held}, buying {requested}")]
    PlayerCapExceeded { cap: u64, held: u64, requested: u64 },

    /// No transition precondition holds in the current state
    #[error("No transition available from {0:?}")]
    TransitionBlocked(LotteryState),

    #[error("Invalid award tiers: {0}")]
    InvalidTiers(String),

    #[error("End time {end_time} is not after {now}")]
    EndTimeInPast { end_time: u64, now: u64 },

    #[error("{0} already claimed")]
    AlreadyClaimed(Address),

    #[error("{0} already refunded")]
    AlreadyRefunded(Address),

    #[error("{0} has no winning tickets")]
    NoWinningTickets(Address),

    #[error("{0} has no refundable tickets")]
    NoRefundableTickets(Address),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl LotteryError {
    /// Stable numeric code for reporting
    pub fn code(&self) -> u32 {
        match self {
            Self::WrongState { .. } | Self::TransitionBlocked(_) => 3001,
            Self::SalesClosed => 3002,
            Self::ZeroTickets | Self::PlayerCapExceeded { .. } => 3003,
            Self::InvalidTiers(_) | Self::EndTimeInPast { .. } => 3101,
            Self::AlreadyClaimed(_) | Self::AlreadyRefunded(_) => 3201,
            Self::NoWinningTickets(_) | Self::NoRefundableTickets(_) => 3202,
            Self::Oracle(OracleError::NotOperator(_)) => 3302,
            Self::Oracle(_) => 3301,
            Self::Core(inner) => inner.code(),
        }
    }

    /// Whether the same call may succeed once the lottery progresses
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::WrongState { .. } | Self::TransitionBlocked(_) => true,
            Self::Oracle(OracleError::NotReady(_)) => true,
            Self::Core(inner) => inner.is_recoverable(),
            _ => false,
        }
    }
}
