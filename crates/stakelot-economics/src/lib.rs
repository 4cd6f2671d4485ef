//! # Stakelot Economics - Staking Rewards & Exit Fees
//!
//! Deterministic model of a staking pool with time-weighted reward
//! distribution.
//!
//! ## Components
//!
//! - **Reward ledger**: reward-per-token accumulator with settle-before-mutate
//! - **Rate models**: continuous (per second) or per-block emission
//! - **Strategy scheduler**: rate changes with reward-pool reconciliation
//! - **Fee schedule**: exit fee decaying with weighted-average stake age
//!
//! ## Data Flow
//!
//! ```text
//!   stake / unstake / claim
//!            │
//!            ▼
//!   ┌──────────────────┐    rate, window    ┌────────────────────┐
//!   │  RewardLedger    │◄───────────────────│ StrategyScheduler  │
//!   │  settle account  │                    │  lock + reconcile  │
//!   └────────┬─────────┘                    └────────────────────┘
//!            │ balance change
//!            ▼
//!   ┌──────────────────┐
//!   │  FeeSchedule     │  (unstake only, evaluated before the balance moves)
//!   └────────┬─────────┘
//!            ▼
//!     token collaborator
//! ```

pub mod error;
pub mod fees;
pub mod rates;
pub mod rewards;
pub mod staking;
pub mod strategy;

// Re-exports
pub use error::{Result, StakeError};
pub use fees::{FeeSchedule, FeeStep};
pub use rates::{AnyRate, ContinuousRate, PerBlockRate, RateModel};
pub use rewards::{AccountStake, RewardLedger, RewardState};
pub use staking::{StakingPool, UnstakeReceipt};
pub use strategy::{Reconciliation, StrategyChange, StrategyScheduler};
