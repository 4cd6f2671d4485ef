//! Transactions accepted by the simulator
//!
//! Every public operation of the staking pool, the lottery and the oracle
//! has a variant, plus clock and token housekeeping. Account fields accept
//! either hex addresses or labels (see [`resolve_account`]); amounts accept
//! integers or decimal strings so values beyond 64 bits survive TOML.
//!
//! [`resolve_account`]: crate::config::resolve_account

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use stakelot_core::{Action, Address, Amount};
use stakelot_economics::{Reconciliation, UnstakeReceipt};
use stakelot_lottery::LotteryState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transaction {
    AdvanceTime {
        secs: u64,
    },
    AdvanceBlocks {
        blocks: u64,
    },
    Mint {
        token: String,
        #[serde(with = "account")]
        to: Address,
        #[serde(with = "amount")]
        amount: Amount,
    },
    Approve {
        token: String,
        #[serde(with = "account")]
        spender: Address,
        #[serde(with = "amount")]
        amount: Amount,
    },
    Transfer {
        token: String,
        #[serde(with = "account")]
        to: Address,
        #[serde(with = "amount")]
        amount: Amount,
    },
    GrantRole {
        action: Action,
        #[serde(with = "account")]
        account: Address,
    },
    RevokeRole {
        action: Action,
        #[serde(with = "account")]
        account: Address,
    },

    Stake {
        #[serde(with = "amount")]
        amount: Amount,
    },
    Unstake {
        #[serde(with = "amount")]
        amount: Amount,
    },
    Claim,
    Exit,
    SetInitialStrategy {
        start: u64,
        #[serde(with = "amount")]
        rate: Amount,
        duration: u64,
    },
    SetStrategy {
        #[serde(with = "amount")]
        rate: Amount,
        duration: u64,
    },
    NotifyRewardAmount {
        #[serde(with = "amount")]
        reward: Amount,
        duration: u64,
    },
    CollectFees {
        #[serde(with = "account")]
        to: Address,
    },
    Pause,
    Unpause,

    ConfigureAwards {
        tickets: Vec<u64>,
        awards: Vec<u64>,
    },
    SetEndTime {
        end_time: u64,
    },
    BuyTickets {
        count: u64,
    },
    TransitState,
    ClaimTickets,
    RefundTickets,

    /// Deliver randomness; numbers are drawn from the simulator's stream when absent
    FulfillRandomness {
        request: u64,
        #[serde(default)]
        numbers: Option<Vec<U256>>,
    },
}

impl Transaction {
    /// Snake-case operation name
    pub fn name(&self) -> &'static str {
        match self {
            Self::AdvanceTime { .. } => "advance_time",
            Self::AdvanceBlocks { .. } => "advance_blocks",
            Self::Mint { .. } => "mint",
            Self::Approve { .. } => "approve",
            Self::Transfer { .. } => "transfer",
            Self::GrantRole { .. } => "grant_role",
            Self::RevokeRole { .. } => "revoke_role",
            Self::Stake { .. } => "stake",
            Self::Unstake { .. } => "unstake",
            Self::Claim => "claim",
            Self::Exit => "exit",
            Self::SetInitialStrategy { .. } => "set_initial_strategy",
            Self::SetStrategy { .. } => "set_strategy",
            Self::NotifyRewardAmount { .. } => "notify_reward_amount",
            Self::CollectFees { .. } => "collect_fees",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::ConfigureAwards { .. } => "configure_awards",
            Self::SetEndTime { .. } => "set_end_time",
            Self::BuyTickets { .. } => "buy_tickets",
            Self::TransitState => "transit_state",
            Self::ClaimTickets => "claim_tickets",
            Self::RefundTickets => "refund_tickets",
            Self::FulfillRandomness { .. } => "fulfill_randomness",
        }
    }
}

/// Value produced by a successful transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxOutput {
    None,
    Amount(#[serde(with = "amount")] Amount),
    Unstaked(UnstakeReceipt),
    Reconciled(Reconciliation),
    Tickets(u64),
    State(LotteryState),
}

/// Labels or hex in, hex out
pub mod account {
    use crate::config::resolve_account;
    use serde::{Deserialize, Deserializer, Serializer};
    use stakelot_core::Address;

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(resolve_account(&name))
    }
}

/// Integers or decimal strings in, decimal strings out
pub mod amount {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use stakelot_core::Amount;
    use std::fmt;

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(v as Amount)
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            Amount::try_from(v).map_err(|_| E::custom(format!("negative amount {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            v.replace('_', "")
                .parse()
                .map_err(|_| E::custom(format!("invalid amount {v:?}")))
        }
    }
}
