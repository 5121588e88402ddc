//! Application configuration, resolved once from the environment by the
//! composition root and passed into each component explicitly.

use crate::domain::{Address, Chain};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub provider_kind: ProviderKind,
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,
    pub price_cache_ttl: Duration,
    pub provider_cache_ttl: Duration,
    /// Long TTL: block/timestamp mappings never change once finalized.
    pub block_cache_ttl: Duration,
    pub sync_hour_utc: u32,
    pub transfer_lookback_blocks: u64,
    pub chains: HashMap<Chain, ChainConfig>,
}

/// Per-chain endpoints and vault allow-list.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub subgraph_url: Option<String>,
    pub eligible_vaults: Vec<Address>,
}

/// Which chain data provider implementation to wire in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Subgraph,
    Rpc,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let provider_kind = match env_map
            .get("PROVIDER_KIND")
            .map(|s| s.as_str())
            .unwrap_or("subgraph")
        {
            "subgraph" => ProviderKind::Subgraph,
            "rpc" => ProviderKind::Rpc,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PROVIDER_KIND".to_string(),
                    format!("must be subgraph or rpc, got {}", other),
                ))
            }
        };

        let coingecko_api_url = env_map
            .get("COINGECKO_API_URL")
            .cloned()
            .unwrap_or_else(|| "https://api.coingecko.com/api/v3".to_string());
        let coingecko_api_key = env_map.get("COINGECKO_API_KEY").cloned();

        let price_cache_ttl =
            Duration::from_secs(parse_u64(&env_map, "PRICE_CACHE_TTL_SECS", 300)?);
        let provider_cache_ttl =
            Duration::from_secs(parse_u64(&env_map, "PROVIDER_CACHE_TTL_SECS", 300)?);
        let block_cache_ttl =
            Duration::from_secs(parse_u64(&env_map, "BLOCK_CACHE_TTL_SECS", 86400)?);

        let sync_hour_utc = parse_u64(&env_map, "SYNC_HOUR_UTC", 0)? as u32;
        if sync_hour_utc > 23 {
            return Err(ConfigError::InvalidValue(
                "SYNC_HOUR_UTC".to_string(),
                "must be 0-23".to_string(),
            ));
        }

        let transfer_lookback_blocks =
            parse_u64(&env_map, "TRANSFER_LOOKBACK_BLOCKS", 500_000)?;

        let mut chains = HashMap::new();
        for chain in Chain::ALL {
            let prefix = chain.env_prefix();
            let rpc_url = match env_map.get(&format!("{}_RPC_URL", prefix)) {
                Some(url) => url.clone(),
                // A chain with no RPC endpoint is simply not configured.
                None => continue,
            };
            let subgraph_url = env_map.get(&format!("{}_SUBGRAPH_URL", prefix)).cloned();
            let eligible_vaults = env_map
                .get(&format!("{}_ELIGIBLE_VAULTS", prefix))
                .map(|list| {
                    list.split(',')
                        .map(|s| s.trim())
                        .filter(|s| !s.is_empty())
                        .map(Address::new)
                        .collect()
                })
                .unwrap_or_default();

            chains.insert(
                chain,
                ChainConfig {
                    rpc_url,
                    subgraph_url,
                    eligible_vaults,
                },
            );
        }

        Ok(Config {
            database_path,
            provider_kind,
            coingecko_api_url,
            coingecko_api_key,
            price_cache_ttl,
            provider_cache_ttl,
            block_cache_ttl,
            sync_hour_utc,
            transfer_lookback_blocks,
            chains,
        })
    }

    /// Per-chain JSON-RPC endpoints.
    pub fn rpc_endpoints(&self) -> HashMap<Chain, String> {
        self.chains
            .iter()
            .map(|(chain, cfg)| (*chain, cfg.rpc_url.clone()))
            .collect()
    }

    /// Per-chain subgraph endpoints, for chains that have one.
    pub fn subgraph_endpoints(&self) -> HashMap<Chain, String> {
        self.chains
            .iter()
            .filter_map(|(chain, cfg)| cfg.subgraph_url.clone().map(|url| (*chain, url)))
            .collect()
    }

    /// Per-chain eligible-vault allow-lists.
    pub fn eligible_vaults(&self) -> HashMap<Chain, Vec<Address>> {
        self.chains
            .iter()
            .map(|(chain, cfg)| (*chain, cfg.eligible_vaults.clone()))
            .collect()
    }
}

fn parse_u64(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a non-negative integer".to_string())
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "BASE_RPC_URL".to_string(),
            "https://mainnet.base.org".to_string(),
        );
        map
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.provider_kind, ProviderKind::Subgraph);
        assert_eq!(config.price_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.block_cache_ttl, Duration::from_secs(86400));
        assert_eq!(config.sync_hour_utc, 0);
        assert_eq!(config.transfer_lookback_blocks, 500_000);
        assert_eq!(
            config.coingecko_api_url,
            "https://api.coingecko.com/api/v3"
        );
    }

    #[test]
    fn test_invalid_provider_kind() {
        let mut env_map = setup_required_env();
        env_map.insert("PROVIDER_KIND".to_string(), "oracle".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PROVIDER_KIND"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_sync_hour() {
        let mut env_map = setup_required_env();
        env_map.insert("SYNC_HOUR_UTC".to_string(), "24".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "SYNC_HOUR_UTC"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_cache_ttl() {
        let mut env_map = setup_required_env();
        env_map.insert("PRICE_CACHE_TTL_SECS".to_string(), "soon".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PRICE_CACHE_TTL_SECS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_unconfigured_chains_are_absent() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert!(config.chains.contains_key(&Chain::Base));
        assert!(!config.chains.contains_key(&Chain::Ethereum));
        assert_eq!(config.rpc_endpoints().len(), 1);
    }

    #[test]
    fn test_chain_config_parsing() {
        let mut env_map = setup_required_env();
        env_map.insert(
            "BASE_SUBGRAPH_URL".to_string(),
            "https://subgraph.example/base".to_string(),
        );
        env_map.insert(
            "BASE_ELIGIBLE_VAULTS".to_string(),
            "0xVaultA, 0xVAULTB,,0xvaultc".to_string(),
        );

        let config = Config::from_env_map(env_map).unwrap();
        let base = config.chains.get(&Chain::Base).unwrap();
        assert_eq!(
            base.subgraph_url.as_deref(),
            Some("https://subgraph.example/base")
        );
        // Addresses come out normalized, empty segments dropped.
        assert_eq!(
            base.eligible_vaults,
            vec![
                Address::new("0xvaulta"),
                Address::new("0xvaultb"),
                Address::new("0xvaultc"),
            ]
        );
    }
}
