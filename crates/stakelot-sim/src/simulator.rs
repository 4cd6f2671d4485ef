//! Serialized transaction execution
//!
//! Each submission reserves the next sequence number, runs against a clone
//! of the world and replaces the world only when it succeeds. A failed
//! transaction leaves no trace beyond its receipt.
//!
//! [`SharedSimulator`] puts the simulator behind a mutex so concurrent
//! callers are totally ordered by lock acquisition.

use crate::config::SimConfig;
use crate::error::Result;
use crate::transaction::{Transaction, TxOutput};
use crate::world::World;
use parking_lot::Mutex;
use primitive_types::U256;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use stakelot_core::{Address, BlockNumber, Timestamp};
use stakelot_lottery::RequestId;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a submitted transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { output: TxOutput },
    Failed { code: u32, error: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Record of one submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub sequence: u64,
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    pub sender: Address,
    pub tx: Transaction,
    pub outcome: Outcome,
}

/// Persisted simulator state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub world: World,
    /// Seed the randomness stream was created from
    pub seed: u64,
    /// Position in the stream, in 32-bit words
    pub word_pos: u128,
}

/// Single-threaded simulator
#[derive(Debug)]
pub struct Simulator {
    world: World,
    rng: ChaCha20Rng,
    seed: u64,
    receipts: Vec<Receipt>,
}

impl Simulator {
    pub fn new(config: &SimConfig) -> Result<Self> {
        let world = World::from_config(config)?;
        info!(
            genesis = world.clock.timestamp(),
            block = world.clock.block_number(),
            "simulator initialized"
        );
        Ok(Self::with_world(world, config.oracle.seed, 0))
    }

    fn with_world(world: World, seed: u64, word_pos: u128) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        rng.set_word_pos(word_pos);
        Self {
            world,
            rng,
            seed,
            receipts: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn oracle_operator(&self) -> Address {
        self.world.oracle.operator()
    }

    /// Apply `tx` atomically and record its receipt
    pub fn submit(&mut self, sender: Address, tx: Transaction) -> Receipt {
        let sequence = self.world.clock.next_sequence();
        let timestamp = self.world.clock.timestamp();
        let block_number = self.world.clock.block_number();
        let tx = self.resolve_randomness(tx);

        let mut next = self.world.clone();
        let outcome = match next.apply(sender, &tx) {
            Ok(output) => {
                self.world = next;
                debug!(sequence, op = tx.name(), %sender, "transaction committed");
                Outcome::Success { output }
            }
            Err(error) => {
                warn!(sequence, op = tx.name(), %sender, %error, "transaction rejected");
                Outcome::Failed {
                    code: error.code(),
                    error: error.to_string(),
                }
            }
        };

        let receipt = Receipt {
            sequence,
            block_number,
            timestamp,
            sender,
            tx,
            outcome,
        };
        self.receipts.push(receipt.clone());
        receipt
    }

    /// Fill in missing fulfilment numbers from the seeded stream
    fn resolve_randomness(&mut self, tx: Transaction) -> Transaction {
        match tx {
            Transaction::FulfillRandomness {
                request,
                numbers: None,
            } => {
                let count = self
                    .world
                    .oracle
                    .request_of(RequestId(request))
                    .map_or(0, |r| r.count);
                let numbers = (0..count).map(|_| self.draw()).collect();
                Transaction::FulfillRandomness {
                    request,
                    numbers: Some(numbers),
                }
            }
            other => other,
        }
    }

    fn draw(&mut self) -> U256 {
        let mut bytes = [0u8; 32];
        self.rng.fill_bytes(&mut bytes);
        U256::from_big_endian(&bytes)
    }

    /// Fulfil every outstanding randomness request from the oracle operator
    pub fn fulfill_pending(&mut self) -> Vec<Receipt> {
        let pending = self.world.oracle.pending();
        pending
            .into_iter()
            .map(|(id, _)| {
                let tx = Transaction::FulfillRandomness {
                    request: id.0,
                    numbers: None,
                };
                self.submit(self.oracle_operator(), tx)
            })
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            world: self.world.clone(),
            seed: self.seed,
            word_pos: self.rng.get_word_pos(),
        }
    }

    /// Write the world and randomness position as pretty JSON
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    /// Resume from a snapshot; the receipt log starts empty
    pub fn load_snapshot(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        info!(path = %path.display(), sequence = snapshot.world.clock.sequence(), "snapshot loaded");
        Ok(Self::with_world(snapshot.world, snapshot.seed, snapshot.word_pos))
    }
}

/// Thread-safe handle; submissions are serialized by the lock
#[derive(Clone, Debug)]
pub struct SharedSimulator {
    inner: Arc<Mutex<Simulator>>,
}

impl SharedSimulator {
    pub fn new(simulator: Simulator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(simulator)),
        }
    }

    pub fn submit(&self, sender: Address, tx: Transaction) -> Receipt {
        self.inner.lock().submit(sender, tx)
    }

    pub fn fulfill_pending(&self) -> Vec<Receipt> {
        self.inner.lock().fulfill_pending()
    }

    /// Read state under the lock
    pub fn read<T>(&self, f: impl FnOnce(&Simulator) -> T) -> T {
        f(&*self.inner.lock())
    }
}
