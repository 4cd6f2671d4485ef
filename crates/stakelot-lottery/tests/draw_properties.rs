//! Properties of finalized draws

use proptest::prelude::*;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use stakelot_core::{Address, Env, FungibleLedger, OwnerAuthority, TokenLedger, U256};
use stakelot_lottery::{
    winning_ticket_count, Lottery, LotteryConfig, LotteryState, RandomNumberOracle, RandomSource,
};

fn random_u256(seed: u64) -> U256 {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    U256::from_big_endian(&bytes)
}

fn players(n: usize) -> Vec<Address> {
    (0..n).map(|i| Address::from_low_u64(i as u64 + 1)).collect()
}

proptest! {
    #[test]
    fn winners_never_exceed_holdings(
        seed in any::<u64>(),
        holdings in prop::collection::vec(1u64..500, 1..30),
        max_win in 1u64..1_000,
    ) {
        let random = random_u256(seed);
        let total: u64 = holdings.iter().sum();
        for (player, held) in players(holdings.len()).iter().zip(&holdings) {
            let won = winning_ticket_count(random, player, *held, total, max_win).unwrap();
            prop_assert!(won <= *held);
        }
    }

    #[test]
    fn sum_stays_near_award_cap(
        seed in any::<u64>(),
        holdings in prop::collection::vec(1u64..500, 1..30),
        max_win in 1u64..1_000,
    ) {
        let random = random_u256(seed);
        let total: u64 = holdings.iter().sum();
        let won: u64 = players(holdings.len())
            .iter()
            .zip(&holdings)
            .map(|(p, held)| winning_ticket_count(random, p, *held, total, max_win).unwrap())
            .sum();
        prop_assert!(won <= total);
        // each player may land up to 5% above their share plus one rounded ticket
        let slack = max_win / 20 + 1 + holdings.len() as u64;
        prop_assert!(won <= max_win.min(total) + slack, "won {} of cap {}", won, max_win);
    }

    #[test]
    fn everyone_wins_when_under_cap(
        seed in any::<u64>(),
        holdings in prop::collection::vec(1u64..100, 1..10),
    ) {
        let random = random_u256(seed);
        let total: u64 = holdings.iter().sum();
        for (player, held) in players(holdings.len()).iter().zip(&holdings) {
            prop_assert_eq!(winning_ticket_count(random, player, *held, total, total).unwrap(), *held);
        }
    }

    #[test]
    fn allocation_is_pure(
        seed in any::<u64>(),
        held in 1u64..1_000,
        extra in 1u64..10_000,
        max_win in 1u64..500,
    ) {
        let random = random_u256(seed);
        let player = Address::from_low_u64(seed);
        let total = held + extra;
        let first = winning_ticket_count(random, &player, held, total, max_win).unwrap();
        for _ in 0..3 {
            prop_assert_eq!(winning_ticket_count(random, &player, held, total, max_win).unwrap(), first);
        }
    }
}

#[test]
fn full_round_settles_every_ticket() {
    let lottery_addr = Address::from_label("lottery");
    let admin = Address::from_label("admin");
    let treasury = Address::from_label("treasury");
    let auth = OwnerAuthority::new(admin);
    let price = 100;

    let mut pay = TokenLedger::new("PAY");
    let mut items = stakelot_core::ItemLedger::new();
    let operator = Address::from_label("oracle");
    let mut oracle = RandomNumberOracle::new(operator);
    let mut lottery = Lottery::new(
        lottery_addr,
        LotteryConfig {
            price_per_ticket: price,
            max_tickets_per_player: None,
            beneficiary: treasury,
            award_item_id: 7,
        },
    );

    let env = Env::new(admin, 0, 0);
    lottery
        .configure_awards(&env, &auth, vec![0, 100, 500], vec![10, 50, 200])
        .unwrap();
    lottery.set_end_time(&env, &auth, 1_000).unwrap();
    lottery.transit_state(&env, &mut oracle).unwrap();

    let buyers = players(6);
    for (i, p) in buyers.iter().enumerate() {
        pay.mint(*p, 1_000_000).unwrap();
        pay.approve(*p, lottery_addr, u128::MAX).unwrap();
        lottery
            .buy_tickets(&Env::new(*p, 10 + i as u64, 1), 30 + 5 * i as u64, &mut pay)
            .unwrap();
    }
    assert_eq!(lottery.ticket_count(), 255);
    assert_eq!(lottery.current_tier_awards(), 50);

    let close = Env::new(admin, 1_000, 80);
    assert_eq!(
        lottery.transit_state(&close, &mut oracle),
        Ok(LotteryState::GeneratingRandomNumber)
    );
    let id = lottery.request_id().unwrap();
    assert!(!oracle.is_complete(id));
    // a buyer cannot pick the number
    assert!(oracle
        .fulfill(&buyers[0], id, vec![random_u256(1)], Some(&mut lottery))
        .is_err());
    assert!(!oracle.is_complete(id));
    assert_eq!(lottery.state(), LotteryState::GeneratingRandomNumber);

    oracle
        .fulfill(&operator, id, vec![random_u256(42)], Some(&mut lottery))
        .unwrap();
    assert_eq!(lottery.state(), LotteryState::Finalized);

    let escrow = pay.balance_of(&lottery_addr);
    let mut awarded = 0;
    for p in &buyers {
        let env = Env::new(*p, 1_001, 81);
        let held = lottery.ticket_count_of(p);
        let won = lottery.winning_ticket_count_of(p).unwrap();
        if won > 0 {
            assert_eq!(lottery.claim_tickets(&env, &mut items, &mut pay).unwrap(), won);
        }
        if won < held {
            lottery.refund_tickets(&env, &mut pay).unwrap();
        }
        awarded += won;
    }

    // every ticket's payment ended up with either the treasury or its buyer
    assert_eq!(pay.balance_of(&lottery_addr), 0);
    assert_eq!(pay.balance_of(&treasury), awarded as u128 * price);
    assert_eq!(escrow, 255 * price);
    let minted: u128 = buyers.iter().map(|p| stakelot_core::BatchLedger::balance_of(&items, p, 7)).sum();
    assert_eq!(minted, awarded as u128);
}

#[test]
fn failed_calls_leave_round_untouched() {
    let lottery_addr = Address::from_label("lottery");
    let admin = Address::from_label("admin");
    let auth = OwnerAuthority::new(admin);
    let alice = Address::from_label("alice");
    let bob = Address::from_label("bob");

    let mut pay = TokenLedger::new("PAY");
    let mut items = stakelot_core::ItemLedger::new();
    let mut oracle = RandomNumberOracle::new(Address::from_label("oracle"));
    let mut lottery = Lottery::new(
        lottery_addr,
        LotteryConfig {
            price_per_ticket: 10,
            max_tickets_per_player: Some(20),
            beneficiary: Address::from_label("treasury"),
            award_item_id: 1,
        },
    );
    let env = Env::new(admin, 0, 0);
    lottery
        .configure_awards(&env, &auth, vec![0], vec![5])
        .unwrap();
    lottery.set_end_time(&env, &auth, 500).unwrap();
    lottery.transit_state(&env, &mut oracle).unwrap();

    pay.mint(alice, 1_000).unwrap();
    pay.approve(alice, lottery_addr, u128::MAX).unwrap();
    pay.mint(bob, 1_000).unwrap();
    lottery
        .buy_tickets(&Env::new(alice, 1, 1), 10, &mut pay)
        .unwrap();

    let snapshot = (lottery.clone(), oracle.clone(), pay.clone());
    let unchanged = |lottery: &Lottery, oracle: &RandomNumberOracle, pay: &TokenLedger| {
        assert_eq!(lottery, &snapshot.0);
        assert_eq!(oracle, &snapshot.1);
        assert_eq!(pay, &snapshot.2);
    };

    let at = Env::new(bob, 2, 1);
    // bob holds tokens but never approved the lottery
    assert!(lottery.buy_tickets(&at, 5, &mut pay).is_err());
    unchanged(&lottery, &oracle, &pay);

    // cap of 20 per player
    assert!(lottery
        .buy_tickets(&Env::new(alice, 2, 1), 11, &mut pay)
        .is_err());
    unchanged(&lottery, &oracle, &pay);

    // sales still open, nothing to advance
    assert!(lottery.transit_state(&at, &mut oracle).is_err());
    unchanged(&lottery, &oracle, &pay);

    assert!(lottery.claim_tickets(&at, &mut items, &mut pay).is_err());
    assert!(lottery.refund_tickets(&at, &mut pay).is_err());
    unchanged(&lottery, &oracle, &pay);
    assert_eq!(stakelot_core::BatchLedger::balance_of(&items, &bob, 1), 0);
}
