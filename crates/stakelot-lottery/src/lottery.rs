//! # No-Loss Lottery
//!
//! Players buy tickets while the round is open. After the close a single
//! random number is requested; once it arrives every player's winning
//! count is a pure function of the finalized state. Winners receive award
//! items and their payment goes to the beneficiary, everyone else is
//! refunded for the tickets that did not win.
//!
//! ```text
//! Created ──► Started ──► Closed ──► GeneratingRandomNumber ──► Finalized
//!   awards +    now >=      >= 1          request
//!   end time    end time    ticket        complete
//! ```
//!
//! A lottery that closes without tickets stays `Closed`. Operations that
//! fail leave the round untouched.

use crate::allocation::winning_ticket_count;
use crate::error::{LotteryError, Result};
use crate::oracle::{RandomSource, RandomnessConsumer, RequestId};
use crate::tiers::AwardTiers;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use stakelot_core::{
    Action, Address, Amount, Authority, BatchLedger, CoreError, Env, FungibleLedger, Timestamp,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

/// Lifecycle of a round; strictly forward
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotteryState {
    Created,
    Started,
    Closed,
    GeneratingRandomNumber,
    Finalized,
}

impl fmt::Display for LotteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Closed => "closed",
            Self::GeneratingRandomNumber => "generating_random_number",
            Self::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Static parameters of a round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryConfig {
    /// Payment token units per ticket
    pub price_per_ticket: Amount,

    /// Optional cap on tickets held by one player
    #[serde(default)]
    pub max_tickets_per_player: Option<u64>,

    /// Receives the payment for winning tickets
    pub beneficiary: Address,

    /// Item id minted to winners, one per winning ticket
    #[serde(default)]
    pub award_item_id: u64,
}

/// Lottery event log entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotteryEvent {
    AwardsConfigured { tickets: Vec<u64>, awards: Vec<u64> },
    EndTimeSet { end_time: Timestamp },
    StateChanged { from: LotteryState, to: LotteryState },
    TicketsBought { player: Address, count: u64, cost: Amount },
    RandomnessRequested { request: RequestId },
    TicketsClaimed { player: Address, winning: u64, forwarded: Amount },
    TicketsRefunded { player: Address, refunded_tickets: u64, amount: Amount },
}

/// One lottery round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lottery {
    /// Lottery account in the payment ledger
    pub address: Address,

    config: LotteryConfig,

    state: LotteryState,

    end_time: Option<Timestamp>,

    tiers: Option<AwardTiers>,

    ticket_count: u64,

    player_tickets: BTreeMap<Address, u64>,

    claims: BTreeSet<Address>,

    refunds: BTreeSet<Address>,

    request_id: Option<RequestId>,

    random_number: Option<U256>,

    events: Vec<LotteryEvent>,
}

impl Lottery {
    pub fn new(address: Address, config: LotteryConfig) -> Self {
        Self {
            address,
            config,
            state: LotteryState::Created,
            end_time: None,
            tiers: None,
            ticket_count: 0,
            player_tickets: BTreeMap::new(),
            claims: BTreeSet::new(),
            refunds: BTreeSet::new(),
            request_id: None,
            random_number: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    pub fn state(&self) -> LotteryState {
        self.state
    }

    pub fn end_time(&self) -> Option<Timestamp> {
        self.end_time
    }

    pub fn tiers(&self) -> Option<&AwardTiers> {
        self.tiers.as_ref()
    }

    pub fn ticket_count(&self) -> u64 {
        self.ticket_count
    }

    pub fn ticket_count_of(&self, player: &Address) -> u64 {
        self.player_tickets.get(player).copied().unwrap_or(0)
    }

    pub fn players(&self) -> impl Iterator<Item = (&Address, &u64)> {
        self.player_tickets.iter()
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    pub fn random_number(&self) -> Option<U256> {
        self.random_number
    }

    pub fn has_claimed(&self, player: &Address) -> bool {
        self.claims.contains(player)
    }

    pub fn has_refunded(&self, player: &Address) -> bool {
        self.refunds.contains(player)
    }

    pub fn events(&self) -> &[LotteryEvent] {
        &self.events
    }

    /// Sales are open: started and before the end time
    pub fn is_open(&self, now: Timestamp) -> bool {
        self.state == LotteryState::Started && self.end_time.map_or(false, |end| now < end)
    }

    fn require_state(&self, expected: LotteryState) -> Result<()> {
        if self.state != expected {
            return Err(LotteryError::WrongState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Set the tier thresholds; only before the round starts
    pub fn configure_awards<A: Authority + ?Sized>(
        &mut self,
        env: &Env,
        authority: &A,
        tickets: Vec<u64>,
        awards: Vec<u64>,
    ) -> Result<()> {
        authority.ensure(&env.sender, Action::ConfigureLottery)?;
        self.require_state(LotteryState::Created)?;
        let tiers = AwardTiers::new(tickets, awards)?;
        self.events.push(LotteryEvent::AwardsConfigured {
            tickets: tiers.tickets().to_vec(),
            awards: tiers.awards().to_vec(),
        });
        info!(tiers = tiers.tickets().len(), "lottery awards configured");
        self.tiers = Some(tiers);
        Ok(())
    }

    /// Set the sales deadline; only before the round starts
    pub fn set_end_time<A: Authority + ?Sized>(
        &mut self,
        env: &Env,
        authority: &A,
        end_time: Timestamp,
    ) -> Result<()> {
        authority.ensure(&env.sender, Action::ConfigureLottery)?;
        self.require_state(LotteryState::Created)?;
        if end_time <= env.timestamp {
            return Err(LotteryError::EndTimeInPast {
                end_time,
                now: env.timestamp,
            });
        }
        self.end_time = Some(end_time);
        self.events.push(LotteryEvent::EndTimeSet { end_time });
        info!(end_time, "lottery end time set");
        Ok(())
    }

    /// Buy `count` tickets for the sender, paying `count * price`
    pub fn buy_tickets<T: FungibleLedger>(
        &mut self,
        env: &Env,
        count: u64,
        payment: &mut T,
    ) -> Result<Amount> {
        self.atomically(|lottery| {
            if lottery.state != LotteryState::Started {
                return Err(LotteryError::WrongState {
                    expected: LotteryState::Started,
                    actual: lottery.state,
                });
            }
            if !lottery.is_open(env.timestamp) {
                return Err(LotteryError::SalesClosed);
            }
            if count == 0 {
                return Err(LotteryError::ZeroTickets);
            }

            let player = env.sender;
            let held = lottery.ticket_count_of(&player);
            let new_held = held.checked_add(count).ok_or(CoreError::Overflow)?;
            if let Some(cap) = lottery.config.max_tickets_per_player {
                if new_held > cap {
                    return Err(LotteryError::PlayerCapExceeded {
                        cap,
                        held,
                        requested: count,
                    });
                }
            }
            let cost = lottery.cost_of(count)?;
            let new_total = lottery.ticket_count.checked_add(count).ok_or(CoreError::Overflow)?;

            lottery.player_tickets.insert(player, new_held);
            lottery.ticket_count = new_total;
            lottery.events.push(LotteryEvent::TicketsBought { player, count, cost });

            payment.transfer_from(lottery.address, player, lottery.address, cost)?;

            debug!(%player, count, cost, total = new_total, "tickets bought");
            Ok(cost)
        })
    }

    /// Advance as far as the preconditions allow.
    ///
    /// Fails with `TransitionBlocked` when not even one step is possible.
    pub fn transit_state<R: RandomSource + ?Sized>(
        &mut self,
        env: &Env,
        oracle: &mut R,
    ) -> Result<LotteryState> {
        self.atomically(|lottery| {
            let mut advanced = false;
            while let Some(next) = lottery.try_advance(env, oracle)? {
                lottery.events.push(LotteryEvent::StateChanged {
                    from: lottery.state,
                    to: next,
                });
                info!(from = %lottery.state, to = %next, "lottery state changed");
                lottery.state = next;
                advanced = true;
            }
            if !advanced {
                return Err(LotteryError::TransitionBlocked(lottery.state));
            }
            Ok(lottery.state)
        })
    }

    /// Take one step if its precondition holds
    fn try_advance<R: RandomSource + ?Sized>(
        &mut self,
        env: &Env,
        oracle: &mut R,
    ) -> Result<Option<LotteryState>> {
        let next = match self.state {
            LotteryState::Created => (self.tiers.is_some() && self.end_time.is_some())
                .then_some(LotteryState::Started),
            LotteryState::Started => self
                .end_time
                .filter(|end| env.timestamp >= *end)
                .map(|_| LotteryState::Closed),
            LotteryState::Closed => {
                if self.ticket_count == 0 {
                    None
                } else {
                    let request = oracle.request(self.address, 1, Some(self.address))?;
                    self.request_id = Some(request);
                    self.events.push(LotteryEvent::RandomnessRequested { request });
                    Some(LotteryState::GeneratingRandomNumber)
                }
            }
            LotteryState::GeneratingRandomNumber => match self.request_id {
                Some(id) if oracle.is_complete(id) => {
                    let numbers = oracle.numbers(id)?;
                    self.random_number = numbers.first().copied();
                    Some(LotteryState::Finalized)
                }
                _ => None,
            },
            LotteryState::Finalized => None,
        };
        Ok(next)
    }

    /// Index of the tier reached by the tickets sold so far
    pub fn current_tier(&self) -> Option<usize> {
        self.tiers.as_ref().and_then(|t| t.tier_for(self.ticket_count))
    }

    /// Winning tickets allowed across all players at the current tier
    pub fn current_tier_awards(&self) -> u64 {
        self.tiers
            .as_ref()
            .map_or(0, |t| t.awards_for(self.ticket_count))
    }

    /// Winning tickets of `player`; only once finalized
    pub fn winning_ticket_count_of(&self, player: &Address) -> Result<u64> {
        self.require_state(LotteryState::Finalized)?;
        let random = self.random_number.unwrap_or_default();
        let count = winning_ticket_count(
            random,
            player,
            self.ticket_count_of(player),
            self.ticket_count,
            self.current_tier_awards(),
        )?;
        Ok(count)
    }

    /// Grant award items for the sender's winning tickets and forward their
    /// payment to the beneficiary
    pub fn claim_tickets<I, T>(&mut self, env: &Env, items: &mut I, payment: &mut T) -> Result<u64>
    where
        I: BatchLedger,
        T: FungibleLedger,
    {
        self.atomically(|lottery| {
            let player = env.sender;
            lottery.require_state(LotteryState::Finalized)?;
            if lottery.claims.contains(&player) {
                return Err(LotteryError::AlreadyClaimed(player));
            }
            let winning = lottery.winning_ticket_count_of(&player)?;
            if winning == 0 {
                return Err(LotteryError::NoWinningTickets(player));
            }
            let forwarded = lottery.cost_of(winning)?;

            lottery.claims.insert(player);
            lottery.events.push(LotteryEvent::TicketsClaimed {
                player,
                winning,
                forwarded,
            });

            let item = lottery.config.award_item_id;
            items.mint(player, item, winning as Amount)?;
            if let Err(err) = payment.transfer(lottery.address, lottery.config.beneficiary, forwarded) {
                items.burn(player, item, winning as Amount)?;
                return Err(err.into());
            }

            info!(%player, winning, forwarded, "tickets claimed");
            Ok(winning)
        })
    }

    /// Return the payment for the sender's non-winning tickets
    pub fn refund_tickets<T: FungibleLedger>(&mut self, env: &Env, payment: &mut T) -> Result<Amount> {
        self.atomically(|lottery| {
            let player = env.sender;
            lottery.require_state(LotteryState::Finalized)?;
            if lottery.refunds.contains(&player) {
                return Err(LotteryError::AlreadyRefunded(player));
            }
            let winning = lottery.winning_ticket_count_of(&player)?;
            let refunded_tickets = lottery.ticket_count_of(&player).saturating_sub(winning);
            if refunded_tickets == 0 {
                return Err(LotteryError::NoRefundableTickets(player));
            }
            let amount = lottery.cost_of(refunded_tickets)?;

            lottery.refunds.insert(player);
            lottery.events.push(LotteryEvent::TicketsRefunded {
                player,
                refunded_tickets,
                amount,
            });

            payment.transfer(lottery.address, player, amount)?;

            info!(%player, refunded_tickets, amount, "tickets refunded");
            Ok(amount)
        })
    }

    /// Run `op`, restoring the round if it fails
    fn atomically<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.clone();
        let result = op(self);
        if result.is_err() {
            *self = saved;
        }
        result
    }

    fn cost_of(&self, tickets: u64) -> Result<Amount> {
        (tickets as Amount)
            .checked_mul(self.config.price_per_ticket)
            .ok_or_else(|| CoreError::Overflow.into())
    }
}

impl RandomnessConsumer for Lottery {
    fn on_random_ready(&mut self, id: RequestId, numbers: &[U256]) -> std::result::Result<(), String> {
        if self.state != LotteryState::GeneratingRandomNumber {
            return Err(format!("lottery is {}", self.state));
        }
        if self.request_id != Some(id) {
            return Err(format!("unexpected request {id}"));
        }
        let random = numbers.first().copied().ok_or("empty randomness")?;

        self.random_number = Some(random);
        self.events.push(LotteryEvent::StateChanged {
            from: self.state,
            to: LotteryState::Finalized,
        });
        self.state = LotteryState::Finalized;
        info!(request = %id, "lottery finalized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::RandomNumberOracle;
    use crate::error::OracleError;
    use stakelot_core::{ItemLedger, OwnerAuthority, TokenLedger};

    const PRICE: Amount = 10;

    struct Fixture {
        lottery: Lottery,
        oracle: RandomNumberOracle,
        pay: TokenLedger,
        items: ItemLedger,
        auth: OwnerAuthority,
        admin: Address,
        operator: Address,
    }

    fn fixture(players: &[Address]) -> Fixture {
        let address = Address::from_label("lottery");
        let admin = Address::from_label("admin");
        let operator = Address::from_label("oracle");
        let mut pay = TokenLedger::new("PAY");
        for p in players {
            pay.mint(*p, 1_000_000).unwrap();
            pay.approve(*p, address, u128::MAX).unwrap();
        }
        let config = LotteryConfig {
            price_per_ticket: PRICE,
            max_tickets_per_player: Some(500),
            beneficiary: Address::from_label("treasury"),
            award_item_id: 1,
        };
        Fixture {
            lottery: Lottery::new(address, config),
            oracle: RandomNumberOracle::new(operator),
            pay,
            items: ItemLedger::new(),
            auth: OwnerAuthority::new(admin),
            admin,
            operator,
        }
    }

    fn start(f: &mut Fixture, end_time: Timestamp) {
        let env = Env::new(f.admin, 0, 0);
        f.lottery
            .configure_awards(&env, &f.auth, vec![0, 100, 500], vec![10, 50, 200])
            .unwrap();
        f.lottery.set_end_time(&env, &f.auth, end_time).unwrap();
        f.lottery.transit_state(&env, &mut f.oracle).unwrap();
        assert_eq!(f.lottery.state(), LotteryState::Started);
    }

    #[test]
    fn test_cannot_start_unconfigured() {
        let mut f = fixture(&[]);
        let env = Env::new(f.admin, 0, 0);
        assert_eq!(
            f.lottery.transit_state(&env, &mut f.oracle),
            Err(LotteryError::TransitionBlocked(LotteryState::Created))
        );
    }

    #[test]
    fn test_tier_awards_follow_sales() {
        let alice = Address::from_label("alice");
        let mut f = fixture(&[alice]);
        start(&mut f, 100);
        let env = Env::new(alice, 10, 1);
        f.lottery.buy_tickets(&env, 50, &mut f.pay).unwrap();
        assert_eq!(f.lottery.current_tier_awards(), 10);
        f.lottery.buy_tickets(&env, 100, &mut f.pay).unwrap();
        assert_eq!(f.lottery.current_tier(), Some(1));
        assert_eq!(f.lottery.current_tier_awards(), 50);
        assert_eq!(f.pay.balance_of(&f.lottery.address), 150 * PRICE);
    }

    #[test]
    fn test_buy_rules() {
        let alice = Address::from_label("alice");
        let mut f = fixture(&[alice]);
        let early = Env::new(alice, 1, 1);
        assert!(matches!(
            f.lottery.buy_tickets(&early, 1, &mut f.pay),
            Err(LotteryError::WrongState { .. })
        ));
        start(&mut f, 100);
        assert_eq!(
            f.lottery.buy_tickets(&early, 0, &mut f.pay),
            Err(LotteryError::ZeroTickets)
        );
        assert_eq!(
            f.lottery.buy_tickets(&early, 501, &mut f.pay),
            Err(LotteryError::PlayerCapExceeded {
                cap: 500,
                held: 0,
                requested: 501
            })
        );
        let late = Env::new(alice, 100, 9);
        assert_eq!(
            f.lottery.buy_tickets(&late, 1, &mut f.pay),
            Err(LotteryError::SalesClosed)
        );
    }

    #[test]
    fn test_failed_buy_leaves_round_untouched() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let mut f = fixture(&[alice]);
        start(&mut f, 100);
        f.lottery
            .buy_tickets(&Env::new(alice, 5, 1), 3, &mut f.pay)
            .unwrap();
        let before = f.lottery.clone();

        // bob has neither funds nor an allowance
        let err = f
            .lottery
            .buy_tickets(&Env::new(bob, 6, 1), 5, &mut f.pay)
            .unwrap_err();
        assert!(matches!(err, LotteryError::Core(CoreError::InsufficientAllowance { .. })));

        // carol approved but holds nothing
        let carol = Address::from_label("carol");
        f.pay.approve(carol, f.lottery.address, u128::MAX).unwrap();
        let err = f
            .lottery
            .buy_tickets(&Env::new(carol, 6, 1), 5, &mut f.pay)
            .unwrap_err();
        assert!(matches!(err, LotteryError::Core(CoreError::InsufficientBalance { .. })));

        assert_eq!(f.lottery, before);
        assert_eq!(f.lottery.ticket_count(), 3);
        assert_eq!(f.lottery.ticket_count_of(&bob), 0);
        assert_eq!(f.pay.balance_of(&f.lottery.address), 3 * PRICE);
    }

    struct Unavailable;

    impl RandomSource for Unavailable {
        fn request(
            &mut self,
            _requester: Address,
            _count: usize,
            _callback: Option<Address>,
        ) -> std::result::Result<RequestId, OracleError> {
            Err(OracleError::ZeroCount)
        }

        fn is_complete(&self, _id: RequestId) -> bool {
            false
        }

        fn numbers(&self, id: RequestId) -> std::result::Result<&[U256], OracleError> {
            Err(OracleError::NotReady(id))
        }
    }

    #[test]
    fn test_failed_cascade_rolls_back_earlier_steps() {
        let alice = Address::from_label("alice");
        let mut f = fixture(&[alice]);
        start(&mut f, 100);
        f.lottery
            .buy_tickets(&Env::new(alice, 5, 1), 3, &mut f.pay)
            .unwrap();
        let before = f.lottery.clone();

        // closing succeeds, the request that follows does not
        let env = Env::new(alice, 100, 10);
        assert_eq!(
            f.lottery.transit_state(&env, &mut Unavailable),
            Err(LotteryError::Oracle(OracleError::ZeroCount))
        );
        assert_eq!(f.lottery, before);
        assert_eq!(f.lottery.state(), LotteryState::Started);

        assert_eq!(
            f.lottery.transit_state(&env, &mut f.oracle),
            Ok(LotteryState::GeneratingRandomNumber)
        );
    }

    #[test]
    fn test_failed_claim_keeps_items_and_flags() {
        let alice = Address::from_label("alice");
        let mut f = fixture(&[alice]);
        start(&mut f, 100);
        f.lottery
            .buy_tickets(&Env::new(alice, 5, 1), 8, &mut f.pay)
            .unwrap();
        let env = Env::new(alice, 100, 10);
        f.lottery.transit_state(&env, &mut f.oracle).unwrap();
        let id = f.lottery.request_id().unwrap();
        f.oracle
            .fulfill(&f.operator, id, vec![U256::from(3)], Some(&mut f.lottery))
            .unwrap();

        // escrow drained behind the lottery's back
        let escrow = f.pay.balance_of(&f.lottery.address);
        f.pay
            .transfer(f.lottery.address, Address::from_label("thief"), escrow)
            .unwrap();
        let before = f.lottery.clone();

        assert!(matches!(
            f.lottery.claim_tickets(&env, &mut f.items, &mut f.pay),
            Err(LotteryError::Core(CoreError::InsufficientBalance { .. }))
        ));
        assert_eq!(f.lottery, before);
        assert!(!f.lottery.has_claimed(&alice));
        assert_eq!(f.items.balance_of(&alice, 1), 0);
    }

    #[test]
    fn test_empty_lottery_stays_closed() {
        let mut f = fixture(&[]);
        start(&mut f, 100);
        let env = Env::new(f.admin, 200, 10);
        assert_eq!(
            f.lottery.transit_state(&env, &mut f.oracle),
            Ok(LotteryState::Closed)
        );
        assert_eq!(
            f.lottery.transit_state(&env, &mut f.oracle),
            Err(LotteryError::TransitionBlocked(LotteryState::Closed))
        );
        assert!(f.oracle.pending().is_empty());
    }

    #[test]
    fn test_close_cascades_into_request() {
        let alice = Address::from_label("alice");
        let mut f = fixture(&[alice]);
        start(&mut f, 100);
        f.lottery
            .buy_tickets(&Env::new(alice, 5, 1), 3, &mut f.pay)
            .unwrap();

        let env = Env::new(alice, 100, 10);
        assert_eq!(
            f.lottery.transit_state(&env, &mut f.oracle),
            Ok(LotteryState::GeneratingRandomNumber)
        );
        assert!(matches!(
            f.lottery.winning_ticket_count_of(&alice),
            Err(LotteryError::WrongState { .. })
        ));

        let id = f.lottery.request_id().unwrap();
        f.oracle
            .fulfill(&f.operator, id, vec![U256::from(99)], Some(&mut f.lottery))
            .unwrap();
        assert_eq!(f.lottery.state(), LotteryState::Finalized);
        assert_eq!(f.lottery.random_number(), Some(U256::from(99)));
    }

    #[test]
    fn test_finalize_without_callback() {
        let alice = Address::from_label("alice");
        let mut f = fixture(&[alice]);
        start(&mut f, 100);
        f.lottery
            .buy_tickets(&Env::new(alice, 5, 1), 3, &mut f.pay)
            .unwrap();
        let env = Env::new(alice, 100, 10);
        f.lottery.transit_state(&env, &mut f.oracle).unwrap();

        let id = f.lottery.request_id().unwrap();
        f.oracle
            .fulfill::<Lottery>(&f.operator, id, vec![U256::from(5)], None)
            .unwrap();
        assert_eq!(
            f.lottery.transit_state(&env, &mut f.oracle),
            Ok(LotteryState::Finalized)
        );
        assert_eq!(f.lottery.random_number(), Some(U256::from(5)));
    }

    #[test]
    fn test_claim_and_refund_once_each() {
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let mut f = fixture(&[alice, bob]);
        start(&mut f, 100);
        f.lottery
            .buy_tickets(&Env::new(alice, 5, 1), 40, &mut f.pay)
            .unwrap();
        f.lottery
            .buy_tickets(&Env::new(bob, 6, 1), 40, &mut f.pay)
            .unwrap();

        let env = Env::new(alice, 100, 10);
        f.lottery.transit_state(&env, &mut f.oracle).unwrap();
        let id = f.lottery.request_id().unwrap();
        f.oracle
            .fulfill(&f.operator, id, vec![U256::from(123_456_789u64)], Some(&mut f.lottery))
            .unwrap();

        let alice_env = Env::new(alice, 101, 11);
        let winning = f.lottery.winning_ticket_count_of(&alice).unwrap();
        // 80 tickets, 10 awards: expected 5 each, drawn within [4.75, 5.25]
        assert!((4..=6).contains(&winning));

        assert_eq!(
            f.lottery
                .claim_tickets(&alice_env, &mut f.items, &mut f.pay)
                .unwrap(),
            winning
        );
        assert_eq!(f.items.balance_of(&alice, 1), winning as Amount);
        assert_eq!(
            f.pay.balance_of(&Address::from_label("treasury")),
            winning as Amount * PRICE
        );
        assert_eq!(
            f.lottery.claim_tickets(&alice_env, &mut f.items, &mut f.pay),
            Err(LotteryError::AlreadyClaimed(alice))
        );

        let refunded = f.lottery.refund_tickets(&alice_env, &mut f.pay).unwrap();
        assert_eq!(refunded, (40 - winning) as Amount * PRICE);
        assert_eq!(
            f.lottery.refund_tickets(&alice_env, &mut f.pay),
            Err(LotteryError::AlreadyRefunded(alice))
        );
        assert!(f.lottery.has_claimed(&alice) && f.lottery.has_refunded(&alice));
    }

    #[test]
    fn test_all_tickets_win_below_tier() {
        let alice = Address::from_label("alice");
        let mut f = fixture(&[alice]);
        start(&mut f, 100);
        f.lottery
            .buy_tickets(&Env::new(alice, 5, 1), 8, &mut f.pay)
            .unwrap();
        let env = Env::new(alice, 100, 10);
        f.lottery.transit_state(&env, &mut f.oracle).unwrap();
        let id = f.lottery.request_id().unwrap();
        f.oracle
            .fulfill(&f.operator, id, vec![U256::from(1)], Some(&mut f.lottery))
            .unwrap();

        assert_eq!(f.lottery.winning_ticket_count_of(&alice), Ok(8));
        assert_eq!(
            f.lottery.refund_tickets(&env, &mut f.pay),
            Err(LotteryError::NoRefundableTickets(alice))
        );
    }

    #[test]
    fn test_configuration_locked_after_start() {
        let mut f = fixture(&[]);
        start(&mut f, 100);
        let env = Env::new(f.admin, 1, 1);
        assert!(matches!(
            f.lottery.set_end_time(&env, &f.auth, 500),
            Err(LotteryError::WrongState { .. })
        ));
        let stranger = Env::new(Address::from_label("mallory"), 1, 1);
        assert!(matches!(
            f.lottery.configure_awards(&stranger, &f.auth, vec![0], vec![1]),
            Err(LotteryError::Core(CoreError::Unauthorized { .. }))
        ));
    }
}
