//! # Reward Accrual Ledger
//!
//! Time-weighted reward distribution using a cumulative reward-per-token
//! accumulator.
//!
//! ```text
//! rpt(now)     = stored + elapsed * rate * 1e18 / total_supply
//! elapsed      = clamp(now, start, end) - last_update
//! earned(acct) = balance * (rpt(now) - paid_rate) / 1e18 + accrued
//! ```
//!
//! ## Settlement
//!
//! Every mutation of a balance, and every change of rate, must be preceded
//! by [`RewardLedger::update_reward`]:
//!
//! 1. store `rpt(now)`
//! 2. advance `last_update` to `clamp(now, start, end)`
//! 3. move the account's `earned` into `accrued` and snapshot `paid_rate`
//!
//! Settling after the mutation would price the elapsed interval against the
//! new total supply.

use crate::error::{Result, StakeError};
use serde::{Deserialize, Serialize};
use stakelot_core::{Address, Amount, CoreError, Decimal, Timestamp, U256};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-account stake record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStake {
    /// Staked amount
    pub balance: Amount,

    /// Timestamp of the most recent stake
    pub last_stake_time: Timestamp,

    /// Balance-weighted average stake time, drives the unstake fee
    pub weighted_avg_stake_time: Timestamp,

    /// Reward-per-token at the last settlement
    pub paid_rate: Decimal,

    /// Settled, unclaimed rewards
    pub rewards_accrued: Amount,

    /// Cumulative unstake fees
    pub fees_paid: Amount,

    /// Cumulative claimed rewards
    pub rewards_claimed: Amount,
}

impl AccountStake {
    /// Fold a new deposit into the weighted-average stake time.
    ///
    /// `new_wavg = now - (now - old_wavg) * old_balance / new_balance`
    fn record_stake(&mut self, amount: Amount, now: Timestamp) -> Result<()> {
        let old_balance = self.balance;
        let new_balance = old_balance.checked_add(amount).ok_or(CoreError::Overflow)?;

        self.weighted_avg_stake_time = if old_balance == 0 || new_balance == 0 {
            now
        } else {
            let age = now.saturating_sub(self.weighted_avg_stake_time);
            let weighted = U256::from(age) * U256::from(old_balance) / U256::from(new_balance);
            // weighted <= age, so it fits in u64
            now - weighted.low_u64()
        };
        self.last_stake_time = now;
        self.balance = new_balance;
        Ok(())
    }
}

/// Global accumulator and distribution window
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardState {
    /// Sum of all balances
    pub total_supply: Amount,

    /// Reward emitted per axis unit
    pub reward_rate: Amount,

    /// First axis position that accrues
    pub start: u64,

    /// Last axis position that accrues
    pub distribution_end: u64,

    /// Position the accumulator was last advanced to
    pub last_update: u64,

    /// Cumulative reward per staked token
    pub reward_per_token_stored: Decimal,

    /// Reward tokens held by the pool
    pub reward_pool: Amount,

    /// Settled rewards not yet claimed
    pub unclaimed: Amount,
}

/// Balances, settlement and claims
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardLedger {
    state: RewardState,
    accounts: BTreeMap<Address, AccountStake>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RewardState {
        &self.state
    }

    pub fn account(&self, account: &Address) -> Option<&AccountStake> {
        self.accounts.get(account)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &AccountStake)> {
        self.accounts.iter()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.accounts.get(account).map(|a| a.balance).unwrap_or(0)
    }

    pub fn total_supply(&self) -> Amount {
        self.state.total_supply
    }

    /// Reward pool not yet owed to anyone by a past settlement
    pub fn reward_supply(&self) -> Amount {
        self.state.reward_pool.saturating_sub(self.state.unclaimed)
    }

    /// `now` clamped into the distribution window
    pub fn last_time_applicable(&self, now: u64) -> u64 {
        now.min(self.state.distribution_end).max(self.state.start)
    }

    /// Accumulator value as of `now`, without storing it
    pub fn current_reward_per_token(&self, now: u64) -> Result<Decimal> {
        let stored = self.state.reward_per_token_stored;
        if self.state.total_supply == 0 {
            return Ok(stored);
        }

        let elapsed = self
            .last_time_applicable(now)
            .saturating_sub(self.state.last_update);
        if elapsed == 0 || self.state.reward_rate == 0 {
            return Ok(stored);
        }

        let emitted = U256::from(elapsed) * U256::from(self.state.reward_rate);
        let increment = Decimal::from_ratio(emitted, self.state.total_supply)?;
        Ok(stored.add(increment)?)
    }

    /// Settled plus pending rewards of an account
    pub fn earned(&self, account: &Address, now: u64) -> Result<Amount> {
        let Some(stake) = self.accounts.get(account) else {
            return Ok(0);
        };
        let rpt = self.current_reward_per_token(now)?;
        let pending = rpt.sub(stake.paid_rate)?.mul_floor(stake.balance)?;
        Ok(pending
            .checked_add(stake.rewards_accrued)
            .ok_or(CoreError::Overflow)?)
    }

    /// Advance the accumulator and, if given, settle one account
    pub fn update_reward(&mut self, account: Option<&Address>, now: u64) -> Result<()> {
        let rpt = self.current_reward_per_token(now)?;
        self.state.reward_per_token_stored = rpt;
        self.state.last_update = self.state.last_update.max(self.last_time_applicable(now));

        if let Some(account) = account {
            let earned = self.earned(account, now)?;
            let stake = self.accounts.entry(*account).or_default();
            let newly_settled = earned - stake.rewards_accrued;
            stake.rewards_accrued = earned;
            stake.paid_rate = rpt;
            self.state.unclaimed = self
                .state
                .unclaimed
                .checked_add(newly_settled)
                .ok_or(CoreError::Overflow)?;
            debug!(%account, earned, rpt = %rpt, "settled rewards");
        }
        Ok(())
    }

    /// Settle the accumulator and re-anchor it at `now`.
    ///
    /// Accrual stops at the old distribution end; the gap between that end
    /// and `now` earns nothing.
    pub fn lock_rates(&mut self, now: u64) -> Result<()> {
        self.update_reward(None, now)?;
        self.state.last_update = self.state.last_update.max(now);
        Ok(())
    }

    /// Install a new distribution window. Callers lock rates first.
    pub(crate) fn set_distribution(&mut self, start: u64, end: u64, rate: Amount, anchor: u64) {
        self.state.start = start;
        self.state.distribution_end = end;
        self.state.reward_rate = rate;
        self.state.last_update = anchor;
    }

    /// Settle, then add to the account's balance
    pub fn deposit(
        &mut self,
        account: &Address,
        amount: Amount,
        timestamp: Timestamp,
        now: u64,
    ) -> Result<()> {
        if amount == 0 {
            return Err(StakeError::ZeroAmount);
        }
        let total_supply = self
            .state
            .total_supply
            .checked_add(amount)
            .ok_or(CoreError::Overflow)?;

        self.update_reward(Some(account), now)?;
        self.accounts
            .entry(*account)
            .or_default()
            .record_stake(amount, timestamp)?;
        self.state.total_supply = total_supply;
        Ok(())
    }

    /// Settle, then remove from the account's balance
    pub fn withdraw(&mut self, account: &Address, amount: Amount, now: u64) -> Result<()> {
        if amount == 0 {
            return Err(StakeError::ZeroAmount);
        }
        let available = self.balance_of(account);
        if amount > available {
            return Err(StakeError::InsufficientStake {
                requested: amount,
                available,
            });
        }

        self.update_reward(Some(account), now)?;
        if let Some(stake) = self.accounts.get_mut(account) {
            stake.balance -= amount;
        }
        self.state.total_supply -= amount;
        Ok(())
    }

    /// Settle and take the account's accrued rewards out of the pool.
    ///
    /// Returns 0 when nothing is accrued. Fails without touching the accrued
    /// amount when the pool cannot cover it.
    pub fn take_rewards(&mut self, account: &Address, now: u64) -> Result<Amount> {
        self.update_reward(Some(account), now)?;

        let Some(stake) = self.accounts.get_mut(account) else {
            return Ok(0);
        };
        let reward = stake.rewards_accrued;
        if reward == 0 {
            return Ok(0);
        }
        if reward > self.state.reward_pool {
            return Err(StakeError::InsufficientRewardPool {
                required: reward,
                available: self.state.reward_pool,
            });
        }

        stake.rewards_accrued = 0;
        stake.rewards_claimed += reward;
        self.state.reward_pool -= reward;
        self.state.unclaimed -= reward;
        Ok(reward)
    }

    /// Whether the pool could pay out `account` right now
    pub fn can_cover(&self, account: &Address, now: u64) -> Result<bool> {
        Ok(self.earned(account, now)? <= self.state.reward_pool)
    }

    pub(crate) fn fund_pool(&mut self, amount: Amount) -> Result<()> {
        self.state.reward_pool = self
            .state
            .reward_pool
            .checked_add(amount)
            .ok_or(CoreError::Overflow)?;
        Ok(())
    }

    pub(crate) fn drain_pool(&mut self, amount: Amount) -> Result<()> {
        let available = self.reward_supply();
        if amount > available {
            return Err(StakeError::InsufficientRewardPool {
                required: amount,
                available,
            });
        }
        self.state.reward_pool -= amount;
        Ok(())
    }

    pub(crate) fn record_fee(&mut self, account: &Address, fee: Amount) {
        if let Some(stake) = self.accounts.get_mut(account) {
            stake.fees_paid += fee;
        }
    }
}
