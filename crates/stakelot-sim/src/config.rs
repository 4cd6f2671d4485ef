//! Simulator configuration types
//!
//! Loaded from an optional TOML file layered under `STAKELOT__*` environment
//! variables, e.g. `STAKELOT__CHAIN__BLOCK_TIME_SECS=6`.

use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use stakelot_core::{Address, Timestamp};
use stakelot_economics::{AnyRate, FeeSchedule};
use std::path::Path;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "STAKELOT";

/// Complete simulator configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Clock and genesis settings
    #[serde(default)]
    pub chain: ChainConfig,

    /// Staking pool deployment
    #[serde(default)]
    pub staking: StakingConfig,

    /// Lottery deployment
    #[serde(default)]
    pub lottery: LotteryParams,

    /// Randomness source
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimConfig {
    /// Load `path` (if given) and apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: SimConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without consulting the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chain.genesis_timestamp()?;
        if self.chain.block_time_secs == 0 {
            return Err(SimError::Config("block_time_secs must be positive".into()));
        }
        if self.staking.staking_token == self.staking.reward_token {
            return Err(SimError::Config(
                "staking and reward tokens must be distinct ledgers".into(),
            ));
        }
        self.staking.fees.validate()?;
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(SimError::Config(format!(
                "unknown log format {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

/// Resolve an account name: `0x`-prefixed hex, or a label hashed to an address
pub fn resolve_account(name: &str) -> Address {
    if name.starts_with("0x") {
        if let Ok(address) = Address::from_hex(name) {
            return address;
        }
    }
    Address::from_label(name)
}

/// Clock settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Genesis wall time, RFC 3339
    #[serde(default = "default_genesis_time")]
    pub genesis_time: String,

    /// Height of the genesis block
    #[serde(default = "default_genesis_block")]
    pub genesis_block: u64,

    /// Seconds between blocks
    #[serde(default = "default_block_time")]
    pub block_time_secs: u64,

    /// Account holding every configuration role
    #[serde(default = "default_admin")]
    pub admin: String,
}

fn default_genesis_time() -> String {
    "2024-01-01T00:00:00Z".to_string()
}

fn default_genesis_block() -> u64 {
    1
}

fn default_block_time() -> u64 {
    stakelot_core::DEFAULT_BLOCK_TIME_SECS
}

fn default_admin() -> String {
    "admin".to_string()
}

impl ChainConfig {
    /// Genesis time as a unix timestamp
    pub fn genesis_timestamp(&self) -> Result<Timestamp> {
        let parsed = chrono::DateTime::parse_from_rfc3339(&self.genesis_time)?;
        u64::try_from(parsed.timestamp())
            .map_err(|_| SimError::Config("genesis time before the unix epoch".into()))
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_time: default_genesis_time(),
            genesis_block: default_genesis_block(),
            block_time_secs: default_block_time(),
            admin: default_admin(),
        }
    }
}

/// Staking pool deployment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Account name of the pool
    #[serde(default = "default_pool_account")]
    pub account: String,

    /// Symbol of the staked token
    #[serde(default = "default_staking_token")]
    pub staking_token: String,

    /// Symbol of the reward token
    #[serde(default = "default_reward_token")]
    pub reward_token: String,

    /// Rate model and its maximum strategy duration
    #[serde(default)]
    pub rate: AnyRate,

    /// Unstake fee schedule
    #[serde(default)]
    pub fees: FeeSchedule,
}

fn default_pool_account() -> String {
    "pool".to_string()
}

fn default_staking_token() -> String {
    "STK".to_string()
}

fn default_reward_token() -> String {
    "RWD".to_string()
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            account: default_pool_account(),
            staking_token: default_staking_token(),
            reward_token: default_reward_token(),
            rate: AnyRate::default(),
            fees: FeeSchedule::default(),
        }
    }
}

/// Lottery deployment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LotteryParams {
    /// Account name of the lottery
    #[serde(default = "default_lottery_account")]
    pub account: String,

    /// Symbol of the token tickets are paid in
    #[serde(default = "default_staking_token")]
    pub payment_token: String,

    /// Price of one ticket in base units
    #[serde(default = "default_ticket_price")]
    pub price_per_ticket: u64,

    /// Optional per-player ticket cap
    #[serde(default)]
    pub max_tickets_per_player: Option<u64>,

    /// Receives the payment for winning tickets
    #[serde(default = "default_beneficiary")]
    pub beneficiary: String,

    /// Item id minted to winners
    #[serde(default = "default_award_item")]
    pub award_item_id: u64,
}

fn default_lottery_account() -> String {
    "lottery".to_string()
}

fn default_ticket_price() -> u64 {
    100
}

fn default_beneficiary() -> String {
    "treasury".to_string()
}

fn default_award_item() -> u64 {
    1
}

impl Default for LotteryParams {
    fn default() -> Self {
        Self {
            account: default_lottery_account(),
            payment_token: default_staking_token(),
            price_per_ticket: default_ticket_price(),
            max_tickets_per_player: None,
            beneficiary: default_beneficiary(),
            award_item_id: default_award_item(),
        }
    }
}

/// Randomness source
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Seed of the ChaCha stream fulfilling requests
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Account that submits fulfilments
    #[serde(default = "default_operator")]
    pub operator: String,
}

fn default_seed() -> u64 {
    0x5eed
}

fn default_operator() -> String {
    "oracle".to_string()
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            operator: default_operator(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format, `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakelot_economics::PerBlockRate;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.chain.genesis_timestamp().unwrap(), 1_704_067_200);
        assert_eq!(config.staking.fees.fee_bps(1800), 800);
    }

    #[test]
    fn test_partial_toml() {
        let config = SimConfig::from_toml_str(
            r#"
            [chain]
            block_time_secs = 6

            [staking.rate]
            model = "per_block"
            max_duration_blocks = 1000

            [lottery]
            price_per_ticket = 5
            max_tickets_per_player = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.chain.block_time_secs, 6);
        assert_eq!(
            config.staking.rate,
            AnyRate::PerBlock(PerBlockRate {
                max_duration_blocks: 1000
            })
        );
        assert_eq!(config.lottery.max_tickets_per_player, Some(20));
        assert_eq!(config.lottery.beneficiary, "treasury");
    }

    #[test]
    fn test_rejects_invalid() {
        assert!(SimConfig::from_toml_str("[chain]\ngenesis_time = \"yesterday\"").is_err());
        assert!(SimConfig::from_toml_str("[staking]\nreward_token = \"STK\"").is_err());
        assert!(SimConfig::from_toml_str("[logging]\nformat = \"xml\"").is_err());
        assert!(SimConfig::from_toml_str(
            "[[staking.fees.steps]]\nbelow = 1\nbps = 100\n[[staking.fees.steps]]\nbelow = 2\nbps = 200"
        )
        .is_err());
    }

    #[test]
    fn test_resolve_account() {
        let hex = "0x00000000000000000000000000000000000000aa";
        assert_eq!(resolve_account(hex).to_hex(), hex);
        assert_eq!(resolve_account("alice"), Address::from_label("alice"));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        std::fs::write(&path, "[oracle]\nseed = 7\n").unwrap();
        let config = SimConfig::load(Some(&path)).unwrap();
        assert_eq!(config.oracle.seed, 7);
        assert_eq!(config.oracle.operator, "oracle");
    }
}
