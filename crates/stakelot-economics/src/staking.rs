//! # Staking Pool
//!
//! Public surface of a staking deployment. Ties the reward ledger, the
//! strategy scheduler and the fee schedule to the token collaborators.
//!
//! Every operation follows the same order:
//!
//! 1. check preconditions
//! 2. settle rewards for the account
//! 3. update internal bookkeeping
//! 4. move tokens through the ledger collaborator
//!
//! Token movements come last so a re-entrant call can never observe
//! half-applied bookkeeping. A call that fails at any step leaves the pool
//! exactly as it was; a second token movement that fails reverses the first.

use crate::error::{Result, StakeError};
use crate::fees::FeeSchedule;
use crate::rates::RateModel;
use crate::rewards::{AccountStake, RewardLedger};
use crate::strategy::{Reconciliation, StrategyScheduler};
use serde::{Deserialize, Serialize};
use stakelot_core::{Action, Address, Amount, Authority, Decimal, Env, FungibleLedger};
use tracing::{info, warn};

/// Outcome of an unstake
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstakeReceipt {
    /// Amount removed from the stake
    pub amount: Amount,
    /// Fee rate applied, in basis points
    pub fee_bps: u32,
    /// Fee withheld into the fee pool
    pub fee: Amount,
    /// Amount returned to the staker
    pub net: Amount,
    /// Rewards paid because the balance reached zero
    pub rewards_claimed: Amount,
}

/// Staking pool over a rate model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingPool<M> {
    /// Pool account in both token ledgers
    pub address: Address,

    model: M,

    ledger: RewardLedger,

    scheduler: StrategyScheduler,

    fees: FeeSchedule,

    /// Unstake fees awaiting collection
    fee_pool: Amount,

    paused: bool,
}

impl<M: RateModel> StakingPool<M> {
    /// Create a pool; the fee schedule must be valid
    pub fn new(address: Address, model: M, fees: FeeSchedule) -> Result<Self> {
        fees.validate()?;
        Ok(Self {
            address,
            model,
            ledger: RewardLedger::new(),
            scheduler: StrategyScheduler::new(),
            fees,
            fee_pool: 0,
            paused: false,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }

    pub fn scheduler(&self) -> &StrategyScheduler {
        &self.scheduler
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn fee_pool(&self) -> Amount {
        self.fee_pool
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn total_supply(&self) -> Amount {
        self.ledger.total_supply()
    }

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.ledger.balance_of(account)
    }

    pub fn account(&self, account: &Address) -> Option<&AccountStake> {
        self.ledger.account(account)
    }

    pub fn earned(&self, account: &Address, env: &Env) -> Result<Amount> {
        self.ledger.earned(account, self.model.position(env))
    }

    pub fn current_reward_per_token(&self, env: &Env) -> Result<Decimal> {
        self.ledger.current_reward_per_token(self.model.position(env))
    }

    /// Fee the sender would pay on unstaking right now, in basis points
    pub fn fee_bps_of(&self, account: &Address, env: &Env) -> u32 {
        let wavg = self
            .ledger
            .account(account)
            .map(|a| a.weighted_avg_stake_time)
            .unwrap_or(env.timestamp);
        self.fees.fee_bps_at(wavg, env.timestamp)
    }

    /// Stake `amount` of the staking token for the sender
    pub fn stake<T: FungibleLedger>(&mut self, env: &Env, amount: Amount, token: &mut T) -> Result<()> {
        self.atomically(|pool| {
            if pool.paused {
                return Err(StakeError::Paused);
            }
            let account = env.sender;
            let now = pool.model.position(env);

            pool.ledger.deposit(&account, amount, env.timestamp, now)?;
            token.transfer_from(pool.address, account, pool.address, amount)?;

            info!(%account, amount, total_supply = pool.ledger.total_supply(), "staked");
            Ok(())
        })
    }

    /// Unstake `amount`, withholding the time-decayed fee.
    ///
    /// When the balance reaches zero the accrued rewards are paid out as
    /// well, provided the reward pool can cover them.
    pub fn unstake<S, R>(
        &mut self,
        env: &Env,
        amount: Amount,
        staking_token: &mut S,
        reward_token: &mut R,
    ) -> Result<UnstakeReceipt>
    where
        S: FungibleLedger,
        R: FungibleLedger,
    {
        self.atomically(|pool| {
            if pool.paused {
                return Err(StakeError::Paused);
            }
            let account = env.sender;
            let now = pool.model.position(env);

            // fee depends on the stake history, so read it before the balance moves
            let fee_bps = pool.fee_bps_of(&account, env);
            pool.ledger.withdraw(&account, amount, now)?;

            let fee = FeeSchedule::fee_for(amount, fee_bps);
            let net = amount - fee;
            pool.ledger.record_fee(&account, fee);
            pool.fee_pool += fee;

            let mut rewards_claimed = 0;
            if pool.ledger.balance_of(&account) == 0 {
                if pool.ledger.can_cover(&account, now)? {
                    rewards_claimed = pool.ledger.take_rewards(&account, now)?;
                } else {
                    warn!(%account, "reward pool short, leaving rewards accrued");
                }
            }

            staking_token.transfer(pool.address, account, net)?;
            if rewards_claimed > 0 {
                if let Err(err) = reward_token.transfer(pool.address, account, rewards_claimed) {
                    staking_token.transfer(account, pool.address, net)?;
                    return Err(err.into());
                }
            }

            info!(%account, amount, fee, net, rewards_claimed, "unstaked");
            Ok(UnstakeReceipt {
                amount,
                fee_bps,
                fee,
                net,
                rewards_claimed,
            })
        })
    }

    /// Pay out the sender's accrued rewards; 0 when there is nothing to pay
    pub fn claim<R: FungibleLedger>(&mut self, env: &Env, reward_token: &mut R) -> Result<Amount> {
        self.atomically(|pool| {
            let account = env.sender;
            let reward = pool.ledger.take_rewards(&account, pool.model.position(env))?;
            if reward > 0 {
                reward_token.transfer(pool.address, account, reward)?;
                info!(%account, reward, "rewards claimed");
            }
            Ok(reward)
        })
    }

    /// Unstake everything and claim
    pub fn exit<S, R>(
        &mut self,
        env: &Env,
        staking_token: &mut S,
        reward_token: &mut R,
    ) -> Result<UnstakeReceipt>
    where
        S: FungibleLedger,
        R: FungibleLedger,
    {
        self.atomically(|pool| {
            let account = env.sender;
            let now = pool.model.position(env);
            // the claim half must not fail once the unstake has paid out
            if !pool.ledger.can_cover(&account, now)? {
                return Err(StakeError::InsufficientRewardPool {
                    required: pool.ledger.earned(&account, now)?,
                    available: pool.ledger.state().reward_pool,
                });
            }
            let balance = pool.ledger.balance_of(&account);
            let mut receipt = pool.unstake(env, balance, staking_token, reward_token)?;
            receipt.rewards_claimed += pool.claim(env, reward_token)?;
            Ok(receipt)
        })
    }

    /// First reward strategy; `start` is a position on the model's axis
    pub fn set_initial_strategy<A, R>(
        &mut self,
        env: &Env,
        authority: &A,
        reward_token: &mut R,
        start: u64,
        rate: Amount,
        duration: u64,
    ) -> Result<Reconciliation>
    where
        A: Authority + ?Sized,
        R: FungibleLedger,
    {
        self.atomically(|pool| {
            authority.ensure(&env.sender, Action::SetStrategy)?;
            let now = pool.model.position(env);
            let max = pool.model.max_duration();
            let rec = pool.scheduler.set_initial_strategy(
                &mut pool.ledger,
                now,
                env.sender,
                start,
                rate,
                duration,
                max,
            )?;
            pool.settle_funding(env.sender, rec, reward_token)?;
            Ok(rec)
        })
    }

    /// Replace the running strategy
    pub fn set_strategy<A, R>(
        &mut self,
        env: &Env,
        authority: &A,
        reward_token: &mut R,
        rate: Amount,
        duration: u64,
    ) -> Result<Reconciliation>
    where
        A: Authority + ?Sized,
        R: FungibleLedger,
    {
        self.atomically(|pool| {
            authority.ensure(&env.sender, Action::SetStrategy)?;
            let now = pool.model.position(env);
            let max = pool.model.max_duration();
            let rec = pool
                .scheduler
                .set_strategy(&mut pool.ledger, now, env.sender, rate, duration, max)?;
            pool.settle_funding(env.sender, rec, reward_token)?;
            Ok(rec)
        })
    }

    /// Add `reward` to the distribution over the next `duration` units
    pub fn notify_reward_amount<A, R>(
        &mut self,
        env: &Env,
        authority: &A,
        reward_token: &mut R,
        reward: Amount,
        duration: u64,
    ) -> Result<Reconciliation>
    where
        A: Authority + ?Sized,
        R: FungibleLedger,
    {
        self.atomically(|pool| {
            authority.ensure(&env.sender, Action::SetStrategy)?;
            let now = pool.model.position(env);
            let max = pool.model.max_duration();
            let rec = pool.scheduler.notify_reward_amount(
                &mut pool.ledger,
                now,
                env.sender,
                reward,
                duration,
                max,
            )?;
            pool.settle_funding(env.sender, rec, reward_token)?;
            Ok(rec)
        })
    }

    fn settle_funding<R: FungibleLedger>(
        &self,
        owner: Address,
        reconciliation: Reconciliation,
        reward_token: &mut R,
    ) -> Result<()> {
        match reconciliation {
            Reconciliation::Pull(amount) => {
                reward_token.transfer_from(self.address, owner, self.address, amount)?
            }
            Reconciliation::Refund(amount) => reward_token.transfer(self.address, owner, amount)?,
            Reconciliation::Balanced => {}
        }
        Ok(())
    }

    /// Send the whole fee pool to `to`
    pub fn collect_fees<A, S>(
        &mut self,
        env: &Env,
        authority: &A,
        staking_token: &mut S,
        to: Address,
    ) -> Result<Amount>
    where
        A: Authority + ?Sized,
        S: FungibleLedger,
    {
        self.atomically(|pool| {
            authority.ensure(&env.sender, Action::CollectFees)?;
            let amount = pool.fee_pool;
            pool.fee_pool = 0;
            if amount > 0 {
                staking_token.transfer(pool.address, to, amount)?;
            }
            info!(collector = %env.sender, %to, amount, "fees collected");
            Ok(amount)
        })
    }

    /// Run `op`, restoring the pool if it fails
    fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.clone();
        let result = op(self);
        if result.is_err() {
            *self = saved;
        }
        result
    }

    pub fn pause<A: Authority + ?Sized>(&mut self, env: &Env, authority: &A) -> Result<()> {
        authority.ensure(&env.sender, Action::Pause)?;
        self.paused = true;
        info!(by = %env.sender, "staking paused");
        Ok(())
    }

    pub fn unpause<A: Authority + ?Sized>(&mut self, env: &Env, authority: &A) -> Result<()> {
        authority.ensure(&env.sender, Action::Pause)?;
        self.paused = false;
        info!(by = %env.sender, "staking unpaused");
        Ok(())
    }
}
