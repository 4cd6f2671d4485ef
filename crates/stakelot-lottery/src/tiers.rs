//! Tiered award thresholds
//!
//! Two parallel, strictly increasing arrays: cumulative tickets sold and
//! the number of winning tickets awarded once that many are sold.
//!
//! ```text
//! tickets: [  0, 100, 500]
//! awards:  [ 10,  50, 200]
//!
//!   50 sold -> tier 0 -> 10 winners
//!  150 sold -> tier 1 -> 50 winners
//! ```

use crate::error::{LotteryError, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardTiers {
    tickets: Vec<u64>,
    awards: Vec<u64>,
}

impl AwardTiers {
    pub fn new(tickets: Vec<u64>, awards: Vec<u64>) -> Result<Self> {
        if tickets.is_empty() {
            return Err(LotteryError::InvalidTiers("no tiers".into()));
        }
        if tickets.len() != awards.len() {
            return Err(LotteryError::InvalidTiers(format!(
                "{} thresholds but {} awards",
                tickets.len(),
                awards.len()
            )));
        }
        if !strictly_increasing(&tickets) {
            return Err(LotteryError::InvalidTiers(
                "ticket thresholds must strictly increase".into(),
            ));
        }
        if !strictly_increasing(&awards) {
            return Err(LotteryError::InvalidTiers("awards must strictly increase".into()));
        }
        Ok(Self { tickets, awards })
    }

    pub fn tickets(&self) -> &[u64] {
        &self.tickets
    }

    pub fn awards(&self) -> &[u64] {
        &self.awards
    }

    /// Largest tier whose threshold `ticket_count` has reached
    pub fn tier_for(&self, ticket_count: u64) -> Option<usize> {
        let reached = self.tickets.partition_point(|&threshold| threshold <= ticket_count);
        reached.checked_sub(1)
    }

    /// Winning tickets allowed at `ticket_count`; 0 below the first threshold
    pub fn awards_for(&self, ticket_count: u64) -> u64 {
        self.tier_for(ticket_count)
            .map(|i| self.awards[i])
            .unwrap_or(0)
    }
}

fn strictly_increasing(values: &[u64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
