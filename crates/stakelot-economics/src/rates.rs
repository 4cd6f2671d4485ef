//! # Rate Models
//!
//! A reward strategy pays a fixed amount per unit of some time axis. Two
//! axes are supported and a deployment picks exactly one:
//!
//! | Model | Axis | Unit | Default max duration |
//! |-------|------|------|----------------------|
//! | [`ContinuousRate`] | block timestamp | second | 90 days |
//! | [`PerBlockRate`] | block number | block | 90 days of 12 s blocks |
//!
//! The reward ledger only ever sees positions on the chosen axis, so the
//! settlement logic is identical for both.

use serde::{Deserialize, Serialize};
use stakelot_core::Env;
use std::fmt;

/// Seconds in one day
pub const SECS_PER_DAY: u64 = 24 * 3600;

/// Longest strategy accepted by default, in seconds
pub const DEFAULT_MAX_DURATION_SECS: u64 = 90 * SECS_PER_DAY;

/// Longest strategy accepted by default, in 12-second blocks
pub const DEFAULT_MAX_DURATION_BLOCKS: u64 = DEFAULT_MAX_DURATION_SECS / 12;

/// Time axis a reward rate is expressed against
pub trait RateModel: Clone + fmt::Debug {
    /// Current position on this model's axis
    fn position(&self, env: &Env) -> u64;

    /// Longest strategy duration accepted, in axis units
    fn max_duration(&self) -> u64;

    /// Short name of the axis unit
    fn unit(&self) -> &'static str;
}

/// Tokens per second over block timestamps
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuousRate {
    pub max_duration_secs: u64,
}

impl Default for ContinuousRate {
    fn default() -> Self {
        Self {
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
        }
    }
}

impl RateModel for ContinuousRate {
    fn position(&self, env: &Env) -> u64 {
        env.timestamp
    }

    fn max_duration(&self) -> u64 {
        self.max_duration_secs
    }

    fn unit(&self) -> &'static str {
        "second"
    }
}

/// Tokens per block over block numbers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerBlockRate {
    pub max_duration_blocks: u64,
}

impl Default for PerBlockRate {
    fn default() -> Self {
        Self {
            max_duration_blocks: DEFAULT_MAX_DURATION_BLOCKS,
        }
    }
}

impl RateModel for PerBlockRate {
    fn position(&self, env: &Env) -> u64 {
        env.block_number
    }

    fn max_duration(&self) -> u64 {
        self.max_duration_blocks
    }

    fn unit(&self) -> &'static str {
        "block"
    }
}

/// Either model, selected at configuration time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum AnyRate {
    Continuous(ContinuousRate),
    PerBlock(PerBlockRate),
}

impl Default for AnyRate {
    fn default() -> Self {
        Self::Continuous(ContinuousRate::default())
    }
}

impl RateModel for AnyRate {
    fn position(&self, env: &Env) -> u64 {
        match self {
            Self::Continuous(m) => m.position(env),
            Self::PerBlock(m) => m.position(env),
        }
    }

    fn max_duration(&self) -> u64 {
        match self {
            Self::Continuous(m) => m.max_duration(),
            Self::PerBlock(m) => m.max_duration(),
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Self::Continuous(m) => m.unit(),
            Self::PerBlock(m) => m.unit(),
        }
    }
}
