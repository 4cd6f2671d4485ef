//! Simulated chain state
//!
//! Everything a transaction can touch lives in [`World`], so a transaction
//! runs against a clone and the clone is committed only on success.

use crate::config::{resolve_account, SimConfig};
use crate::error::{Result, SimError};
use crate::transaction::{Transaction, TxOutput};
use serde::{Deserialize, Serialize};
use stakelot_core::{
    Action, Address, Authority, ChainClock, FungibleLedger, ItemLedger, RoleAuthority, TokenLedger,
};
use stakelot_economics::{AnyRate, StakingPool};
use stakelot_lottery::{Lottery, LotteryConfig, RandomNumberOracle, RequestId};
use std::collections::BTreeMap;
use tracing::debug;

/// Full simulated state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub clock: ChainClock,

    /// Fungible ledgers by symbol
    pub tokens: BTreeMap<String, TokenLedger>,

    pub items: ItemLedger,

    pub pool: StakingPool<AnyRate>,

    pub lottery: Lottery,

    pub oracle: RandomNumberOracle,

    pub authority: RoleAuthority,

    staking_token: String,

    reward_token: String,

    payment_token: String,
}

impl World {
    /// Genesis state for `config`
    pub fn from_config(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let clock = ChainClock::new(
            config.chain.genesis_timestamp()?,
            config.chain.genesis_block,
            config.chain.block_time_secs,
        );

        let staking = &config.staking;
        let pool = StakingPool::new(
            resolve_account(&staking.account),
            staking.rate.clone(),
            staking.fees.clone(),
        )?;

        let params = &config.lottery;
        let lottery = Lottery::new(
            resolve_account(&params.account),
            LotteryConfig {
                price_per_ticket: params.price_per_ticket as u128,
                max_tickets_per_player: params.max_tickets_per_player,
                beneficiary: resolve_account(&params.beneficiary),
                award_item_id: params.award_item_id,
            },
        );

        let mut tokens = BTreeMap::new();
        for symbol in [&staking.staking_token, &staking.reward_token, &params.payment_token] {
            tokens
                .entry(symbol.clone())
                .or_insert_with(|| TokenLedger::new(symbol.clone()));
        }

        Ok(Self {
            clock,
            tokens,
            items: ItemLedger::new(),
            pool,
            lottery,
            oracle: RandomNumberOracle::new(resolve_account(&config.oracle.operator)),
            authority: RoleAuthority::with_admin(resolve_account(&config.chain.admin)),
            staking_token: staking.staking_token.clone(),
            reward_token: staking.reward_token.clone(),
            payment_token: params.payment_token.clone(),
        })
    }

    pub fn token(&self, symbol: &str) -> Result<&TokenLedger> {
        self.tokens
            .get(symbol)
            .ok_or_else(|| SimError::UnknownToken(symbol.to_string()))
    }

    pub fn staking_token(&self) -> &str {
        &self.staking_token
    }

    pub fn reward_token(&self) -> &str {
        &self.reward_token
    }

    pub fn payment_token(&self) -> &str {
        &self.payment_token
    }

    /// Balance of `account` in `symbol`, zero for unknown tokens
    pub fn balance_of(&self, symbol: &str, account: &Address) -> u128 {
        self.tokens
            .get(symbol)
            .map_or(0, |ledger| ledger.balance_of(account))
    }

    /// Run `tx` from `sender` at the current clock position
    pub fn apply(&mut self, sender: Address, tx: &Transaction) -> Result<TxOutput> {
        let env = self.clock.env(sender);
        debug!(op = tx.name(), %sender, timestamp = env.timestamp, block = env.block_number, "apply");

        let output = match tx {
            Transaction::AdvanceTime { secs } => {
                self.clock.advance_secs(*secs)?;
                TxOutput::None
            }
            Transaction::AdvanceBlocks { blocks } => {
                self.clock.advance_blocks(*blocks)?;
                TxOutput::None
            }
            Transaction::Mint { token, to, amount } => {
                ensure_admin(&self.authority, &sender)?;
                token_mut(&mut self.tokens, token)?.mint(*to, *amount)?;
                TxOutput::None
            }
            Transaction::Approve {
                token,
                spender,
                amount,
            } => {
                token_mut(&mut self.tokens, token)?.approve(sender, *spender, *amount)?;
                TxOutput::None
            }
            Transaction::Transfer { token, to, amount } => {
                token_mut(&mut self.tokens, token)?.transfer(sender, *to, *amount)?;
                TxOutput::None
            }
            Transaction::GrantRole { action, account } => {
                ensure_admin(&self.authority, &sender)?;
                self.authority.grant(*action, *account);
                TxOutput::None
            }
            Transaction::RevokeRole { action, account } => {
                ensure_admin(&self.authority, &sender)?;
                self.authority.revoke(*action, account);
                TxOutput::None
            }

            Transaction::Stake { amount } => {
                let stk = token_mut(&mut self.tokens, &self.staking_token)?;
                self.pool.stake(&env, *amount, stk)?;
                TxOutput::None
            }
            Transaction::Unstake { amount } => {
                let mut rwd = take_token(&mut self.tokens, &self.reward_token)?;
                let result = match token_mut(&mut self.tokens, &self.staking_token) {
                    Ok(stk) => self.pool.unstake(&env, *amount, stk, &mut rwd).map_err(SimError::from),
                    Err(e) => Err(e),
                };
                self.tokens.insert(self.reward_token.clone(), rwd);
                TxOutput::Unstaked(result?)
            }
            Transaction::Claim => {
                let rwd = token_mut(&mut self.tokens, &self.reward_token)?;
                TxOutput::Amount(self.pool.claim(&env, rwd)?)
            }
            Transaction::Exit => {
                let mut rwd = take_token(&mut self.tokens, &self.reward_token)?;
                let result = match token_mut(&mut self.tokens, &self.staking_token) {
                    Ok(stk) => self.pool.exit(&env, stk, &mut rwd).map_err(SimError::from),
                    Err(e) => Err(e),
                };
                self.tokens.insert(self.reward_token.clone(), rwd);
                TxOutput::Unstaked(result?)
            }
            Transaction::SetInitialStrategy {
                start,
                rate,
                duration,
            } => {
                let rwd = token_mut(&mut self.tokens, &self.reward_token)?;
                let rec = self.pool.set_initial_strategy(
                    &env,
                    &self.authority,
                    rwd,
                    *start,
                    *rate,
                    *duration,
                )?;
                TxOutput::Reconciled(rec)
            }
            Transaction::SetStrategy { rate, duration } => {
                let rwd = token_mut(&mut self.tokens, &self.reward_token)?;
                let rec = self
                    .pool
                    .set_strategy(&env, &self.authority, rwd, *rate, *duration)?;
                TxOutput::Reconciled(rec)
            }
            Transaction::NotifyRewardAmount { reward, duration } => {
                let rwd = token_mut(&mut self.tokens, &self.reward_token)?;
                let rec = self
                    .pool
                    .notify_reward_amount(&env, &self.authority, rwd, *reward, *duration)?;
                TxOutput::Reconciled(rec)
            }
            Transaction::CollectFees { to } => {
                let stk = token_mut(&mut self.tokens, &self.staking_token)?;
                TxOutput::Amount(self.pool.collect_fees(&env, &self.authority, stk, *to)?)
            }
            Transaction::Pause => {
                self.pool.pause(&env, &self.authority)?;
                TxOutput::None
            }
            Transaction::Unpause => {
                self.pool.unpause(&env, &self.authority)?;
                TxOutput::None
            }

            Transaction::ConfigureAwards { tickets, awards } => {
                self.lottery
                    .configure_awards(&env, &self.authority, tickets.clone(), awards.clone())?;
                TxOutput::None
            }
            Transaction::SetEndTime { end_time } => {
                self.lottery.set_end_time(&env, &self.authority, *end_time)?;
                TxOutput::None
            }
            Transaction::BuyTickets { count } => {
                let pay = token_mut(&mut self.tokens, &self.payment_token)?;
                TxOutput::Amount(self.lottery.buy_tickets(&env, *count, pay)?)
            }
            Transaction::TransitState => {
                TxOutput::State(self.lottery.transit_state(&env, &mut self.oracle)?)
            }
            Transaction::ClaimTickets => {
                let pay = token_mut(&mut self.tokens, &self.payment_token)?;
                TxOutput::Tickets(self.lottery.claim_tickets(&env, &mut self.items, pay)?)
            }
            Transaction::RefundTickets => {
                let pay = token_mut(&mut self.tokens, &self.payment_token)?;
                TxOutput::Amount(self.lottery.refund_tickets(&env, pay)?)
            }
            Transaction::FulfillRandomness { request, numbers } => {
                let id = RequestId(*request);
                let numbers = numbers.clone().ok_or_else(|| {
                    SimError::Scenario(format!("no numbers supplied for request {id}"))
                })?;
                let callback = self.oracle.request_of(id).and_then(|r| r.callback);
                let consumer = match callback {
                    Some(target) if target == self.lottery.address => Some(&mut self.lottery),
                    _ => None,
                };
                self.oracle.fulfill(&sender, id, numbers, consumer)?;
                TxOutput::None
            }
        };
        Ok(output)
    }
}

fn token_mut<'a>(
    tokens: &'a mut BTreeMap<String, TokenLedger>,
    symbol: &str,
) -> Result<&'a mut TokenLedger> {
    tokens
        .get_mut(symbol)
        .ok_or_else(|| SimError::UnknownToken(symbol.to_string()))
}

/// Remove a ledger so it can be borrowed alongside another one
fn take_token(tokens: &mut BTreeMap<String, TokenLedger>, symbol: &str) -> Result<TokenLedger> {
    tokens
        .remove(symbol)
        .ok_or_else(|| SimError::UnknownToken(symbol.to_string()))
}

/// Housekeeping (minting, role changes) needs every configuration role
fn ensure_admin(authority: &RoleAuthority, caller: &Address) -> stakelot_core::Result<()> {
    for action in [
        Action::SetStrategy,
        Action::CollectFees,
        Action::Pause,
        Action::ConfigureLottery,
    ] {
        authority.ensure(caller, action)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::from_config(&SimConfig::default()).unwrap()
    }

    #[test]
    fn test_genesis() {
        let w = world();
        assert_eq!(w.clock.timestamp(), 1_704_067_200);
        assert_eq!(w.tokens.len(), 2);
        assert!(w.token("STK").is_ok());
        assert!(matches!(w.token("XYZ"), Err(SimError::UnknownToken(_))));
    }

    #[test]
    fn test_mint_requires_admin() {
        let mut w = world();
        let alice = Address::from_label("alice");
        let mint = Transaction::Mint {
            token: "STK".into(),
            to: alice,
            amount: 10,
        };
        assert!(matches!(w.apply(alice, &mint), Err(SimError::Core(_))));
        w.apply(Address::from_label("admin"), &mint).unwrap();
        assert_eq!(w.balance_of("STK", &alice), 10);
    }

    #[test]
    fn test_failed_unstake_keeps_reward_ledger() {
        let mut w = world();
        let alice = Address::from_label("alice");
        assert!(w.apply(alice, &Transaction::Unstake { amount: 1 }).is_err());
        assert!(w.token("RWD").is_ok());
    }
}
