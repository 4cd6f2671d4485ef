//! TOML scenarios
//!
//! ```toml
//! name = "stake and claim"
//!
//! [[accounts]]
//! name = "alice"
//! mint = [{ token = "STK", amount = 1000000 }]
//! approve = [{ token = "STK", spender = "pool" }]
//!
//! [[steps]]
//! from = "alice"
//! op = "stake"
//! amount = 1000
//!
//! [[steps]]
//! op = "fulfill_pending"
//! ```
//!
//! Steps run in order through the simulator. Each may state whether it is
//! expected to succeed; mismatches are reported, not fatal.

use crate::config::resolve_account;
use crate::error::{Result, SimError};
use crate::simulator::{Receipt, Simulator};
use crate::transaction::{amount, Transaction};
use serde::{Deserialize, Serialize};
use stakelot_core::{Address, Amount};
use stakelot_lottery::LotteryState;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Clone, Debug, Deserialize)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub accounts: Vec<AccountSetup>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Initial holdings of one account
#[derive(Clone, Debug, Deserialize)]
pub struct AccountSetup {
    pub name: String,

    #[serde(default)]
    pub mint: Vec<Holding>,

    /// Unlimited allowances granted at setup
    #[serde(default)]
    pub approve: Vec<Approval>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Holding {
    pub token: String,
    #[serde(with = "amount")]
    pub amount: Amount,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Approval {
    pub token: String,
    pub spender: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    #[default]
    Success,
    Failure,
    Any,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Step {
    /// Sender; the configured admin when absent
    #[serde(default)]
    pub from: Option<String>,

    #[serde(default)]
    pub expect: Expect,

    #[serde(flatten)]
    pub action: StepAction,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum StepAction {
    Tx(Transaction),
    Control(Control),
}

/// Harness actions that are not transactions themselves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Control {
    /// Fulfil every outstanding randomness request
    FulfillPending,
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub expect: Expect,
    pub matched: bool,
    pub receipts: Vec<Receipt>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScenarioReport {
    pub name: String,
    pub steps: Vec<StepReport>,
    pub summary: Summary,
}

impl ScenarioReport {
    pub fn mismatches(&self) -> usize {
        self.steps.iter().filter(|s| !s.matched).count()
    }
}

/// Final state digest
#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub transactions: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timestamp: u64,
    pub block_number: u64,
    pub total_staked: Amount,
    pub reward_pool: Amount,
    pub fee_pool: Amount,
    pub lottery_state: LotteryState,
    pub tickets_sold: u64,
    /// account name -> token -> balance
    pub balances: BTreeMap<String, BTreeMap<String, Amount>>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply account setup, then every step
    pub fn run(&self, sim: &mut Simulator, admin: Address) -> Result<ScenarioReport> {
        info!(scenario = %self.name, steps = self.steps.len(), "running scenario");
        self.setup(sim, admin)?;

        let mut steps = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let sender = step.from.as_deref().map_or(admin, resolve_account);
            let receipts = match &step.action {
                StepAction::Tx(tx) => vec![sim.submit(sender, tx.clone())],
                StepAction::Control(Control::FulfillPending) => sim.fulfill_pending(),
            };
            let succeeded = receipts.iter().all(|r| r.outcome.is_success());
            let matched = match step.expect {
                Expect::Success => succeeded,
                Expect::Failure => !succeeded,
                Expect::Any => true,
            };
            if !matched {
                warn!(step = index, expect = ?step.expect, "step outcome differs from expectation");
            }
            steps.push(StepReport {
                index,
                expect: step.expect,
                matched,
                receipts,
            });
        }

        let summary = self.summarize(sim, &steps);
        info!(
            scenario = %self.name,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "scenario finished"
        );
        Ok(ScenarioReport {
            name: self.name.clone(),
            steps,
            summary,
        })
    }

    fn setup(&self, sim: &mut Simulator, admin: Address) -> Result<()> {
        for account in &self.accounts {
            let address = resolve_account(&account.name);
            let mut txs: Vec<(Address, Transaction)> = Vec::new();
            for holding in &account.mint {
                txs.push((
                    admin,
                    Transaction::Mint {
                        token: holding.token.clone(),
                        to: address,
                        amount: holding.amount,
                    },
                ));
            }
            for approval in &account.approve {
                txs.push((
                    address,
                    Transaction::Approve {
                        token: approval.token.clone(),
                        spender: resolve_account(&approval.spender),
                        amount: Amount::MAX,
                    },
                ));
            }
            for (sender, tx) in txs {
                let receipt = sim.submit(sender, tx);
                if !receipt.outcome.is_success() {
                    return Err(SimError::Scenario(format!(
                        "setup of {} failed: {:?}",
                        account.name, receipt.outcome
                    )));
                }
            }
        }
        Ok(())
    }

    fn summarize(&self, sim: &Simulator, steps: &[StepReport]) -> Summary {
        let world = sim.world();
        let receipts = steps.iter().flat_map(|s| &s.receipts);
        let (succeeded, failed) = receipts.fold((0, 0), |(ok, err), r| {
            if r.outcome.is_success() {
                (ok + 1, err)
            } else {
                (ok, err + 1)
            }
        });

        let balances = self
            .accounts
            .iter()
            .map(|account| {
                let address = resolve_account(&account.name);
                let held = world
                    .tokens
                    .keys()
                    .map(|symbol| (symbol.clone(), world.balance_of(symbol, &address)))
                    .collect();
                (account.name.clone(), held)
            })
            .collect();

        Summary {
            transactions: succeeded + failed,
            succeeded,
            failed,
            timestamp: world.clock.timestamp(),
            block_number: world.clock.block_number(),
            total_staked: world.pool.total_supply(),
            reward_pool: world.pool.ledger().state().reward_pool,
            fee_pool: world.pool.fee_pool(),
            lottery_state: world.lottery.state(),
            tickets_sold: world.lottery.ticket_count(),
            balances,
        }
    }
}
