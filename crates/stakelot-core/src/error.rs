//! Error types for Stakelot core primitives and collaborators

use crate::types::{Address, Amount};
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the fixed-point type and the ledger collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // === Arithmetic ===
    /// Subtraction would produce a negative value
    #[error("Arithmetic underflow")]
    Underflow,

    /// Result does not fit the target representation
    #[error("Arithmetic overflow")]
    Overflow,

    // === Token ledger ===
    /// Sender balance too small for the transfer
    #[error("Insufficient balance for {account}: need {required}, have {available}")]
    InsufficientBalance {
        account: Address,
        required: Amount,
        available: Amount,
    },

    /// Spender allowance too small for the pull
    #[error("Insufficient allowance from {owner} to {spender}: need {required}, have {available}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        required: Amount,
        available: Amount,
    },

    /// Transfer to or from the zero address
    #[error("Zero address not allowed")]
    ZeroAddress,

    // === Item ledger ===
    /// Batch arguments of different lengths
    #[error("Batch length mismatch: {ids} ids, {amounts} amounts")]
    BatchLengthMismatch { ids: usize, amounts: usize },

    /// Not enough items of one id
    #[error("Insufficient items of id {id} for {account}: need {required}, have {available}")]
    InsufficientItems {
        account: Address,
        id: u64,
        required: Amount,
        available: Amount,
    },

    // === Authority ===
    /// Caller not allowed to perform the action
    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized { caller: Address, action: String },

    // === General ===
    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Stable numeric code for reporting
    pub fn code(&self) -> u32 {
        match self {
            Self::Underflow | Self::Overflow => 1001,
            Self::InsufficientBalance { .. } => 1101,
            Self::InsufficientAllowance { .. } => 1102,
            Self::ZeroAddress => 1103,
            Self::BatchLengthMismatch { .. } | Self::InsufficientItems { .. } => 1201,
            Self::Unauthorized { .. } => 1301,
            Self::InvalidInput(_) => 9999,
        }
    }

    /// Whether resubmitting after topping up balances or allowances can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance { .. }
                | Self::InsufficientAllowance { .. }
                | Self::InsufficientItems { .. }
        )
    }
}
