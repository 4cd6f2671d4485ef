//! Winning ticket allocation
//!
//! When more tickets are sold than the tier awards, each player wins a
//! randomized share close to their proportional one:
//!
//! ```text
//! expected = tickets * max_winning / total          (18 decimals)
//! drawn    = uniform in [0.95 * expected, 1.05 * expected]
//! count    = floor(drawn) + 1 with probability fract(drawn)
//! result   = min(count, tickets)
//! ```
//!
//! Both draws hash the stored random number with the player address and
//! the salted total, so the result is a pure function of finalized state.

use primitive_types::U256;
use stakelot_core::decimal::{scale, to_u128};
use stakelot_core::{Address, Decimal, Result};

/// Multiplier applied to the total ticket count in the draw preimage
pub const TOTAL_TICKETS_SALT: u64 = 321;

/// Lower edge of the draw, percent of expected
pub const LOWER_BOUND_PERCENT: u64 = 95;

/// Upper edge of the draw, percent of expected
pub const UPPER_BOUND_PERCENT: u64 = 105;

const DRAW_DOMAIN: &[u8] = b"stakelot/lottery/draw";
const ROUND_DOMAIN: &[u8] = b"stakelot/lottery/round-up";

/// Winning tickets of one player in a finalized round
pub fn winning_ticket_count(
    random_number: U256,
    player: &Address,
    player_tickets: u64,
    total_tickets: u64,
    max_winning: u64,
) -> Result<u64> {
    if player_tickets == 0 {
        return Ok(0);
    }
    if total_tickets <= max_winning {
        return Ok(player_tickets);
    }

    let expected = Decimal::from_ratio(
        U256::from(player_tickets) * U256::from(max_winning),
        total_tickets,
    )?;
    let low = expected.mul(LOWER_BOUND_PERCENT)?.div(100u64);
    let high = expected.mul(UPPER_BOUND_PERCENT)?.div(100u64);
    let span = high.sub(low)?.mantissa();

    let salted_total = U256::from(total_tickets) * U256::from(TOTAL_TICKETS_SALT);
    let draw = hash_draw(DRAW_DOMAIN, random_number, player, salted_total);
    let drawn = low.add(Decimal::from_mantissa(draw % (span + U256::one())))?;

    let mut count = drawn.floor();
    let fract = drawn.fract();
    if !fract.is_zero() {
        let coin = hash_draw(ROUND_DOMAIN, random_number, player, salted_total) % scale();
        if coin < fract {
            count += U256::one();
        }
    }

    let count = to_u128(count)?.min(player_tickets as u128);
    Ok(count as u64)
}

fn hash_draw(domain: &[u8], random_number: U256, player: &Address, salted_total: U256) -> U256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    hasher.update(&be_bytes(random_number));
    hasher.update(player.as_bytes());
    hasher.update(&be_bytes(salted_total));
    U256::from_big_endian(hasher.finalize().as_bytes())
}

fn be_bytes(value: U256) -> [u8; 32] {
    let mut out = [0u8; 32];
    value.to_big_endian(&mut out);
    out
}
