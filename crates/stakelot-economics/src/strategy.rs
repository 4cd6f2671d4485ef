//! # Reward Strategy Scheduler
//!
//! Owns the lifecycle of reward rates:
//!
//! - `set_initial_strategy` once, for a start position in the future
//! - `set_strategy` any number of times after that start
//! - `notify_reward_amount` to top up a continuous distribution
//!
//! Every change locks the accumulator at the current position, then
//! reconciles the reward pool: the new strategy needs `rate * duration`,
//! the old one still owes `max(0, end - now) * old_rate`. The difference is
//! pulled from, or refunded to, the strategy owner.

use crate::error::{Result, StakeError};
use crate::rewards::RewardLedger;
use serde::{Deserialize, Serialize};
use stakelot_core::decimal::to_u128;
use stakelot_core::{Address, Amount, CoreError, U256};
use tracing::info;

/// Funding movement required by a strategy change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum Reconciliation {
    Balanced,
    /// Owner must transfer this much into the pool
    Pull(Amount),
    /// Pool returns this much to the owner
    Refund(Amount),
}

/// Record of one strategy change
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyChange {
    /// Axis position the change was made at
    pub at: u64,
    pub start: u64,
    pub end: u64,
    pub rate: Amount,
    pub owner: Address,
    pub reconciliation: Reconciliation,
}

/// Strategy state machine
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyScheduler {
    initial_start: Option<u64>,
    history: Vec<StrategyChange>,
}

impl StrategyScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initial_start.is_some()
    }

    pub fn initial_start(&self) -> Option<u64> {
        self.initial_start
    }

    pub fn history(&self) -> &[StrategyChange] {
        &self.history
    }

    /// Owner of the most recent strategy
    pub fn strategy_owner(&self) -> Option<Address> {
        self.history.last().map(|c| c.owner)
    }

    /// First strategy, starting strictly in the future. Callable once.
    #[allow(clippy::too_many_arguments)]
    pub fn set_initial_strategy(
        &mut self,
        ledger: &mut RewardLedger,
        now: u64,
        owner: Address,
        start: u64,
        rate: Amount,
        duration: u64,
        max_duration: u64,
    ) -> Result<Reconciliation> {
        if self.initial_start.is_some() {
            return Err(StakeError::InitialStrategyAlreadySet);
        }
        if now >= start {
            return Err(StakeError::StartNotInFuture { start, now });
        }
        check_duration(duration, max_duration)?;
        let end = start.checked_add(duration).ok_or(CoreError::Overflow)?;

        self.apply(ledger, now, owner, start, end, rate, duration, start)
    }

    /// Replace the running strategy, starting now
    pub fn set_strategy(
        &mut self,
        ledger: &mut RewardLedger,
        now: u64,
        owner: Address,
        rate: Amount,
        duration: u64,
        max_duration: u64,
    ) -> Result<Reconciliation> {
        let start = self.initial_start.ok_or(StakeError::InitialStrategyNotSet)?;
        if now < start {
            return Err(StakeError::StrategyNotStarted { start, now });
        }
        check_duration(duration, max_duration)?;
        let end = now.checked_add(duration).ok_or(CoreError::Overflow)?;

        self.apply(ledger, now, owner, start, end, rate, duration, now)
    }

    /// Spread `reward` plus whatever is still undistributed over `duration`,
    /// starting now. Bootstraps the schedule when no strategy exists yet.
    pub fn notify_reward_amount(
        &mut self,
        ledger: &mut RewardLedger,
        now: u64,
        owner: Address,
        reward: Amount,
        duration: u64,
        max_duration: u64,
    ) -> Result<Reconciliation> {
        if reward == 0 {
            return Err(StakeError::ZeroAmount);
        }
        check_duration(duration, max_duration)?;
        let start = match self.initial_start {
            Some(start) if now < start => return Err(StakeError::StrategyNotStarted { start, now }),
            Some(start) => start,
            None => now,
        };

        let leftover = not_yet_distributed(ledger, now)?;
        let total = reward.checked_add(leftover).ok_or(CoreError::Overflow)?;
        let rate = total / duration as Amount;
        let end = now.checked_add(duration).ok_or(CoreError::Overflow)?;

        self.apply(ledger, now, owner, start, end, rate, duration, now)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply(
        &mut self,
        ledger: &mut RewardLedger,
        now: u64,
        owner: Address,
        start: u64,
        end: u64,
        rate: Amount,
        duration: u64,
        anchor: u64,
    ) -> Result<Reconciliation> {
        ledger.lock_rates(now)?;

        let owed = not_yet_distributed(ledger, now)?;
        let required = to_u128(U256::from(rate) * U256::from(duration))?;
        let reconciliation = if required > owed {
            Reconciliation::Pull(required - owed)
        } else if required < owed {
            Reconciliation::Refund(owed - required)
        } else {
            Reconciliation::Balanced
        };

        match reconciliation {
            Reconciliation::Pull(amount) => ledger.fund_pool(amount)?,
            Reconciliation::Refund(amount) => ledger.drain_pool(amount)?,
            Reconciliation::Balanced => {}
        }
        ledger.set_distribution(start, end, rate, anchor);
        self.initial_start.get_or_insert(start);

        info!(start, end, rate, %owner, ?reconciliation, "reward strategy updated");
        self.history.push(StrategyChange {
            at: now,
            start,
            end,
            rate,
            owner,
            reconciliation,
        });
        Ok(reconciliation)
    }
}

fn check_duration(duration: u64, max_duration: u64) -> Result<()> {
    if duration == 0 {
        return Err(StakeError::ZeroDuration);
    }
    if duration > max_duration {
        return Err(StakeError::DurationTooLong {
            duration,
            max: max_duration,
        });
    }
    Ok(())
}

/// Reward the current strategy has yet to emit after `now`
fn not_yet_distributed(ledger: &RewardLedger, now: u64) -> Result<Amount> {
    let state = ledger.state();
    let remaining = state.distribution_end.saturating_sub(now.max(state.start));
    Ok(to_u128(U256::from(remaining) * U256::from(state.reward_rate))?)
}
