//! # Stakelot Simulator
//!
//! Deterministic single-chain harness around the staking pool, the lottery
//! and the randomness oracle.
//!
//! ## Execution Model
//!
//! ```text
//!   submit(sender, tx)
//!         │  next sequence number
//!         ▼
//!   clone World ──► apply ──► Ok  ──► commit clone, Success receipt
//!                         └─► Err ──► drop clone,   Failed receipt
//! ```
//!
//! Randomness is the only asynchronous input: requests are created by the
//! lottery and fulfilled later by a separate transaction whose numbers come
//! from a seeded ChaCha stream.

pub mod config;
pub mod error;
pub mod scenario;
pub mod simulator;
pub mod transaction;
pub mod world;

pub use config::{resolve_account, SimConfig};
pub use error::{Result, SimError};
pub use scenario::{Scenario, ScenarioReport, Summary};
pub use simulator::{Outcome, Receipt, SharedSimulator, Simulator, Snapshot};
pub use transaction::{Transaction, TxOutput};
pub use world::World;
