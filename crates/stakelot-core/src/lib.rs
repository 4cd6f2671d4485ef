//! # Stakelot Core
//!
//! Shared building blocks for the staking and lottery engines:
//!
//! - [`Decimal`] - 18-digit fixed-point number used for reward-per-token math
//! - [`ChainClock`] - simulated block height, timestamp and transaction order
//! - [`FungibleLedger`] / [`BatchLedger`] - token collaborators the engines pay through
//! - [`Authority`] - injected authorization predicate
//!
//! Everything here is deterministic: the same inputs always produce the same
//! state, which is what lets a simulation replay a history exactly.

pub mod authority;
pub mod clock;
pub mod decimal;
pub mod error;
pub mod ledger;
pub mod types;

pub use authority::*;
pub use clock::*;
pub use decimal::{Decimal, EXPONENT};
pub use error::*;
pub use ledger::*;
pub use types::*;

pub use primitive_types::U256;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::authority::{Action, Authority, OwnerAuthority, RoleAuthority};
    pub use crate::clock::ChainClock;
    pub use crate::decimal::Decimal;
    pub use crate::error::{CoreError, Result};
    pub use crate::ledger::{BatchLedger, FungibleLedger, ItemLedger, TokenLedger};
    pub use crate::types::*;
    pub use primitive_types::U256;
}
