//! Core type definitions for Stakelot
//!
//! Accounts are 20-byte addresses, token amounts are `u128` in the smallest
//! unit (18 decimals, like wei), and time is measured in Unix seconds and
//! block numbers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Token amount in the smallest unit
pub type Amount = u128;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Block height
pub type BlockNumber = u64;

/// Decimal places of every token handled by the engine
pub const DECIMALS: u8 = 18;

/// One whole token in the smallest unit
pub const ONE_TOKEN: Amount = 1_000_000_000_000_000_000;

/// Basis points denominator (100%)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address
    pub const ZERO: Self = Self([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address whose low 8 bytes encode `n` (handy for tests and fixtures)
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// Deterministic address derived from a human label with BLAKE3
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash.as_bytes()[..20]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex with or without `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)?;
        if bytes.len() != 20 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", &self.to_hex()[..12])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Execution context of one transaction: who sent it and when
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    /// Transaction sender
    pub sender: Address,
    /// Block timestamp
    pub timestamp: Timestamp,
    /// Block height
    pub block_number: BlockNumber,
}

impl Env {
    pub fn new(sender: Address, timestamp: Timestamp, block_number: BlockNumber) -> Self {
        Self {
            sender,
            timestamp,
            block_number,
        }
    }

    /// Same block, different sender
    pub fn with_sender(&self, sender: Address) -> Self {
        Self { sender, ..*self }
    }
}
