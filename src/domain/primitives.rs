//! Domain primitives: Chain, Address, SnapshotDate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Supported chains for vault reward accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Base,
    Ethereum,
    Arbitrum,
    Optimism,
}

impl Chain {
    /// All supported chains, in daily-sync order.
    pub const ALL: [Chain; 4] = [
        Chain::Base,
        Chain::Ethereum,
        Chain::Arbitrum,
        Chain::Optimism,
    ];

    /// Lowercase chain name as stored and configured.
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Base => "base",
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
        }
    }

    /// Uppercase prefix used for per-chain environment variables.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Chain::Base => "BASE",
            Chain::Ethereum => "ETHEREUM",
            Chain::Arbitrum => "ARBITRUM",
            Chain::Optimism => "OPTIMISM",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown chain: {0}")]
pub struct ParseChainError(String);

impl FromStr for Chain {
    type Err = ParseChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base" => Ok(Chain::Base),
            "ethereum" => Ok(Chain::Ethereum),
            "arbitrum" => Ok(Chain::Arbitrum),
            "optimism" => Ok(Chain::Optimism),
            other => Err(ParseChainError(other.to_string())),
        }
    }
}

/// Wallet or contract address (hex string).
///
/// Normalized to lowercase at construction; all storage and comparison
/// happens on the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Address(String);

impl Address {
    /// Create an Address, trimming whitespace and lowercasing.
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into().trim().to_lowercase())
    }

    /// Get the normalized address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address::new(s)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Address::new(s))
    }
}

/// A snapshot date, truncated to UTC midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotDate(NaiveDate);

impl SnapshotDate {
    /// Create a SnapshotDate from a calendar date.
    pub fn new(date: NaiveDate) -> Self {
        SnapshotDate(date)
    }

    /// Truncate a UTC instant to its snapshot date.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        SnapshotDate(dt.date_naive())
    }

    /// Today's snapshot date (UTC).
    pub fn today() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Unix timestamp of this date's UTC midnight, used for block resolution.
    pub fn to_utc_midnight_ts(&self) -> i64 {
        self.0
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default()
    }

    /// The underlying calendar date.
    pub fn as_date(&self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for SnapshotDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for SnapshotDate {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(SnapshotDate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_roundtrip() {
        for chain in Chain::ALL {
            let parsed: Chain = chain.as_str().parse().unwrap();
            assert_eq!(parsed, chain);
        }
    }

    #[test]
    fn test_chain_parse_case_insensitive() {
        assert_eq!("Base".parse::<Chain>().unwrap(), Chain::Base);
        assert_eq!("ETHEREUM".parse::<Chain>().unwrap(), Chain::Ethereum);
        assert!("solana".parse::<Chain>().is_err());
    }

    #[test]
    fn test_chain_serde_lowercase() {
        let json = serde_json::to_string(&Chain::Arbitrum).unwrap();
        assert_eq!(json, "\"arbitrum\"");
    }

    #[test]
    fn test_address_normalizes_case() {
        let addr = Address::new("0xABCdef123");
        assert_eq!(addr.as_str(), "0xabcdef123");
        assert_eq!(addr, Address::new(" 0xAbCdEf123 "));
    }

    #[test]
    fn test_address_deserialize_normalizes() {
        let addr: Address = serde_json::from_str("\"0xDEADbeef\"").unwrap();
        assert_eq!(addr.as_str(), "0xdeadbeef");
    }

    #[test]
    fn test_snapshot_date_truncates_to_midnight() {
        let dt = DateTime::parse_from_rfc3339("2024-03-15T17:45:12Z")
            .unwrap()
            .with_timezone(&Utc);
        let date = SnapshotDate::from_datetime(dt);
        assert_eq!(date.to_string(), "2024-03-15");
        // 2024-03-15T00:00:00Z
        assert_eq!(date.to_utc_midnight_ts(), 1710460800);
    }

    #[test]
    fn test_snapshot_date_parse() {
        let date: SnapshotDate = "2024-03-15".parse().unwrap();
        assert_eq!(date.to_string(), "2024-03-15");
        assert!("not-a-date".parse::<SnapshotDate>().is_err());
    }
}
