//! # Unstake Fee Schedule
//!
//! Exit fee decays with the time since the account's weighted-average stake
//! time. Default schedule, in hours:
//!
//! | Elapsed | Fee |
//! |---------|-----|
//! | < 1 | 8% |
//! | < 24 | 4% |
//! | < 72 | 2% |
//! | < 168 (1 week) | 1% |
//! | < 336 (2 weeks) | 0.5% |
//! | < 672 (4 weeks) | 0.25% |
//! | < 2016 (12 weeks) | 0.1% |
//! | otherwise | 0.01% |

use crate::error::{Result, StakeError};
use serde::{Deserialize, Serialize};
use stakelot_core::{Amount, Timestamp, BPS_DENOMINATOR, U256};

/// One hour, the default time-scale unit
pub const DEFAULT_TIME_SCALE_SECS: u64 = 3600;

/// One bucket of the schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStep {
    /// Applies while elapsed units are strictly below this bound
    pub below: u64,
    /// Fee in basis points
    pub bps: u32,
}

/// Step function from elapsed time to fee
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Seconds per schedule unit
    #[serde(default = "default_time_scale")]
    pub time_scale_secs: u64,

    /// Buckets, increasing in bound and decreasing in fee
    #[serde(default = "default_steps")]
    pub steps: Vec<FeeStep>,

    /// Fee past the last bucket
    #[serde(default = "default_floor_bps")]
    pub floor_bps: u32,
}

fn default_time_scale() -> u64 {
    DEFAULT_TIME_SCALE_SECS
}

fn default_steps() -> Vec<FeeStep> {
    [
        (1, 800),
        (24, 400),
        (72, 200),
        (168, 100),
        (336, 50),
        (672, 25),
        (2016, 10),
    ]
    .into_iter()
    .map(|(below, bps)| FeeStep { below, bps })
    .collect()
}

fn default_floor_bps() -> u32 {
    1
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            time_scale_secs: default_time_scale(),
            steps: default_steps(),
            floor_bps: default_floor_bps(),
        }
    }
}

impl FeeSchedule {
    /// Check the schedule is a strictly decreasing step function
    pub fn validate(&self) -> Result<()> {
        if self.time_scale_secs == 0 {
            return Err(StakeError::InvalidFeeSchedule("time scale must be positive".into()));
        }
        let mut previous: Option<FeeStep> = None;
        for step in &self.steps {
            if step.bps > BPS_DENOMINATOR {
                return Err(StakeError::InvalidFeeSchedule(format!(
                    "fee {} exceeds {} bps",
                    step.bps, BPS_DENOMINATOR
                )));
            }
            if let Some(prev) = previous {
                if step.below <= prev.below || step.bps >= prev.bps {
                    return Err(StakeError::InvalidFeeSchedule(format!(
                        "step below {} is not after step below {}",
                        step.below, prev.below
                    )));
                }
            }
            previous = Some(*step);
        }
        if let Some(last) = previous {
            if self.floor_bps >= last.bps {
                return Err(StakeError::InvalidFeeSchedule(
                    "floor must be below the last step".into(),
                ));
            }
        }
        Ok(())
    }

    /// Fee in basis points after `elapsed_secs`
    pub fn fee_bps(&self, elapsed_secs: u64) -> u32 {
        let units = elapsed_secs / self.time_scale_secs.max(1);
        self.steps
            .iter()
            .find(|step| units < step.below)
            .map(|step| step.bps)
            .unwrap_or(self.floor_bps)
    }

    /// Fee in basis points for a stake averaged at `weighted_avg` and exited at `now`
    pub fn fee_bps_at(&self, weighted_avg: Timestamp, now: Timestamp) -> u32 {
        self.fee_bps(now.saturating_sub(weighted_avg))
    }

    /// `amount * bps / 10000`, rounded down
    pub fn fee_for(amount: Amount, bps: u32) -> Amount {
        let fee = U256::from(amount) * U256::from(bps) / U256::from(BPS_DENOMINATOR);
        // bps <= 10000 keeps fee <= amount
        fee.low_u128()
    }
}
