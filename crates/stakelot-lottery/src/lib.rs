//! # Stakelot Lottery - No-Loss Draws
//!
//! Ticket sales, tiered award caps and deterministic winner allocation on
//! top of a two-phase random number oracle.
//!
//! ## Round Flow
//!
//! ```text
//!   buy_tickets ──► close ──► oracle.request ─ ─ ─ ► oracle.fulfill
//!                                                       │ callback
//!                                                       ▼
//!                   claim_tickets / refund_tickets ◄── Finalized
//! ```
//!
//! Sales close strictly before the random number exists, so no ticket can
//! be bought with knowledge of the outcome.

pub mod allocation;
pub mod error;
pub mod lottery;
pub mod oracle;
pub mod tiers;

// Re-exports
pub use allocation::winning_ticket_count;
pub use error::{LotteryError, OracleError, Result};
pub use lottery::{Lottery, LotteryConfig, LotteryEvent, LotteryState};
pub use oracle::{
    OracleEvent, RandomNumberOracle, RandomRequest, RandomSource, RandomnessConsumer, RequestId,
};
pub use tiers::AwardTiers;
