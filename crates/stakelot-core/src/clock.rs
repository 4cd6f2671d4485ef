//! Simulated chain clock
//!
//! Every transaction executes at a block height and a block timestamp, and
//! gets a sequence number that totally orders it against every other
//! transaction. Time only moves forward.

use crate::error::{CoreError, Result};
use crate::types::{Address, BlockNumber, Env, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Block time used when none is configured (seconds)
pub const DEFAULT_BLOCK_TIME_SECS: u64 = 12;

/// Monotonic clock producing block heights, timestamps and sequence numbers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainClock {
    /// Timestamp of the genesis block
    genesis_time: Timestamp,

    /// Height of the genesis block
    genesis_block: BlockNumber,

    /// Current block timestamp
    timestamp: Timestamp,

    /// Current block height
    block_number: BlockNumber,

    /// Seconds between consecutive blocks
    block_time: u64,

    /// Sequence number of the last applied transaction
    sequence: u64,
}

impl ChainClock {
    /// Create a clock at the given genesis point
    pub fn new(genesis_time: Timestamp, genesis_block: BlockNumber, block_time: u64) -> Self {
        Self {
            genesis_time,
            genesis_block,
            timestamp: genesis_time,
            block_number: genesis_block,
            block_time: block_time.max(1),
            sequence: 0,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn block_number(&self) -> BlockNumber {
        self.block_number
    }

    pub fn block_time(&self) -> u64 {
        self.block_time
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Advance wall time; the height is the number of whole block intervals
    /// since genesis, so sub-block steps accumulate
    pub fn advance_secs(&mut self, secs: u64) -> Result<()> {
        let timestamp = self.timestamp.checked_add(secs).ok_or(CoreError::Overflow)?;
        self.set_timestamp(timestamp)
    }

    /// Advance a number of blocks; wall time follows at `block_time` spacing
    pub fn advance_blocks(&mut self, blocks: u64) -> Result<()> {
        let secs = blocks
            .checked_mul(self.block_time)
            .ok_or(CoreError::Overflow)?;
        self.advance_secs(secs)
    }

    /// Jump to an absolute timestamp; earlier targets are ignored
    pub fn warp_to(&mut self, timestamp: Timestamp) -> Result<()> {
        if timestamp > self.timestamp {
            self.set_timestamp(timestamp)?;
        }
        Ok(())
    }

    fn set_timestamp(&mut self, timestamp: Timestamp) -> Result<()> {
        let blocks = (timestamp - self.genesis_time) / self.block_time;
        self.block_number = self
            .genesis_block
            .checked_add(blocks)
            .ok_or(CoreError::Overflow)?;
        self.timestamp = timestamp;
        Ok(())
    }

    /// Reserve the next sequence number
    pub fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Execution context for a transaction sent now
    pub fn env(&self, sender: Address) -> Env {
        Env::new(sender, self.timestamp, self.block_number)
    }

    /// Position of the clock as a comparable tick
    pub fn tick(&self) -> Tick {
        Tick {
            block_number: self.block_number,
            sequence: self.sequence,
        }
    }
}

impl Default for ChainClock {
    fn default() -> Self {
        Self::new(0, 0, DEFAULT_BLOCK_TIME_SECS)
    }
}

/// Total order over applied transactions: block height, then sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tick {
    pub block_number: BlockNumber,
    pub sequence: u64,
}

impl PartialOrd for Tick {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tick {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.block_number.cmp(&other.block_number) {
            Ordering::Equal => self.sequence.cmp(&other.sequence),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_secs_moves_blocks() {
        let mut clock = ChainClock::new(1_000, 10, 12);
        clock.advance_secs(36).unwrap();
        assert_eq!(clock.timestamp(), 1_036);
        assert_eq!(clock.block_number(), 13);
    }

    #[test]
    fn test_sub_block_steps_accumulate() {
        let mut clock = ChainClock::new(0, 0, 12);
        for _ in 0..24 {
            clock.advance_secs(5).unwrap();
        }
        assert_eq!(clock.timestamp(), 120);
        assert_eq!(clock.block_number(), 10);

        clock.advance_secs(7).unwrap();
        clock.advance_blocks(2).unwrap();
        assert_eq!(clock.timestamp(), 151);
        assert_eq!(clock.block_number(), 12);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let mut clock = ChainClock::new(u64::MAX - 10, 0, 12);
        assert!(matches!(clock.advance_secs(11), Err(CoreError::Overflow)));
        assert!(matches!(clock.advance_blocks(u64::MAX), Err(CoreError::Overflow)));
        assert_eq!(clock.timestamp(), u64::MAX - 10);
        assert_eq!(clock.block_number(), 0);
    }

    #[test]
    fn test_advance_blocks_moves_time() {
        let mut clock = ChainClock::new(0, 0, 12);
        clock.advance_blocks(5).unwrap();
        assert_eq!(clock.block_number(), 5);
        assert_eq!(clock.timestamp(), 60);
    }

    #[test]
    fn test_warp_never_goes_back() {
        let mut clock = ChainClock::new(500, 0, 1);
        clock.warp_to(100).unwrap();
        assert_eq!(clock.timestamp(), 500);
        clock.warp_to(600).unwrap();
        assert_eq!(clock.timestamp(), 600);
        assert_eq!(clock.block_number(), 100);
    }

    #[test]
    fn test_sequence_orders_ticks() {
        let mut clock = ChainClock::default();
        clock.next_sequence();
        let a = clock.tick();
        clock.next_sequence();
        let b = clock.tick();
        assert!(a < b);

        clock.advance_blocks(1).unwrap();
        assert!(b < clock.tick());
    }

    #[test]
    fn test_zero_block_time_clamped() {
        let clock = ChainClock::new(0, 0, 0);
        assert_eq!(clock.block_time(), 1);
    }
}
