use crate::chain::rpc::ContractAddresses;
use crate::domain::{Address, Asset, AssetRegistry};
use crate::orchestration::DEFAULT_CONCURRENCY;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3002;
pub const DEFAULT_ADDRESSES_FILE: &str = "./logs/unique_addresses1.txt";
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub rpc_url: String,
    pub contracts: ContractAddresses,
    pub addresses_file: String,
    pub assets_file: Option<String>,
    pub backfill_concurrency: usize,
    pub read_timeout_ms: u64,
    pub backfill_interval_secs: Option<u64>,
    pub events_file: Option<String>,
    pub metrics_port: Option<u16>,
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
        let port = parse_or(&env_map, "PORT", DEFAULT_PORT, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let rpc_url = env_map
            .get("RPC_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("RPC_URL".to_string()))?;

        let contracts = ContractAddresses {
            pool: contract_address(&env_map, "POOL_ADDRESS", ContractAddresses::BASE_POOL)?,
            pool_addresses_provider: contract_address(
                &env_map,
                "POOL_ADDRESSES_PROVIDER",
                ContractAddresses::BASE_POOL_ADDRESSES_PROVIDER,
            )?,
            ui_pool_data_provider: contract_address(
                &env_map,
                "UI_POOL_DATA_PROVIDER",
                ContractAddresses::BASE_UI_POOL_DATA_PROVIDER,
            )?,
        };

        let addresses_file = env_map
            .get("ADDRESSES_FILE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_ADDRESSES_FILE.to_string());

        let backfill_concurrency = parse_or(
            &env_map,
            "BACKFILL_CONCURRENCY",
            DEFAULT_CONCURRENCY,
            "must be a positive integer",
        )?;
        if backfill_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "BACKFILL_CONCURRENCY".to_string(),
                "must be a positive integer".to_string(),
            ));
        }

        let read_timeout_ms = parse_or(
            &env_map,
            "READ_TIMEOUT_MS",
            DEFAULT_READ_TIMEOUT_MS,
            "must be a valid u64",
        )?;

        let backfill_interval_secs =
            parse_optional::<u64>(&env_map, "BACKFILL_INTERVAL_SECS", "must be a valid u64")?
                .filter(|secs| *secs > 0);

        let metrics_port = parse_optional::<u16>(&env_map, "METRICS_PORT", "must be a valid u16")?;

        Ok(Config {
            port,
            database_path,
            rpc_url,
            contracts,
            addresses_file,
            assets_file: env_map.get("ASSETS_FILE").cloned(),
            backfill_concurrency,
            read_timeout_ms,
            backfill_interval_secs,
            events_file: env_map.get("EVENTS_FILE").cloned(),
            metrics_port,
        })
    }

    /// Asset table from `ASSETS_FILE`, or the built-in Base list.
    pub fn load_assets(&self) -> Result<AssetRegistry, ConfigError> {
        let Some(path) = &self.assets_file else {
            return Ok(AssetRegistry::base_default());
        };
        let content = std::fs::read_to_string(path).map_err(|_| {
            ConfigError::InvalidValue(
                "ASSETS_FILE".to_string(),
                "file not found or unreadable".to_string(),
            )
        })?;
        parse_assets(&content)
    }
}

/// Parse a JSON array of `{address, symbol, decimals}` entries.
pub fn parse_assets(content: &str) -> Result<AssetRegistry, ConfigError> {
    let assets: Vec<Asset> = serde_json::from_str(content)
        .map_err(|e| ConfigError::InvalidValue("ASSETS_FILE".to_string(), e.to_string()))?;
    Ok(AssetRegistry::new(assets))
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    expected: &str,
) -> Result<T, ConfigError> {
    Ok(parse_optional(env_map, key, expected)?.unwrap_or(default))
}

fn parse_optional<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    expected: &str,
) -> Result<Option<T>, ConfigError> {
    env_map
        .get(key)
        .map(|s| {
            s.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue(key.to_string(), expected.to_string()))
        })
        .transpose()
}

fn contract_address(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Address, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    let address = Address::from_str(raw)
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))?;
    if address.to_alloy().is_err() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a 20-byte hex address".to_string(),
        ));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert("RPC_URL".to_string(), "http://localhost:8545".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 3002);
        assert_eq!(config.addresses_file, DEFAULT_ADDRESSES_FILE);
        assert_eq!(config.backfill_concurrency, 10);
        assert_eq!(config.read_timeout_ms, 10_000);
        assert_eq!(config.contracts, ContractAddresses::base_mainnet());
        assert!(config.backfill_interval_secs.is_none());
        assert!(config.events_file.is_none());
        assert!(config.metrics_port.is_none());
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
    fn test_missing_rpc_url() {
        let mut env_map = setup_required_env();
        env_map.remove("RPC_URL");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "RPC_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("BACKFILL_CONCURRENCY".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BACKFILL_CONCURRENCY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_pool_address() {
        let mut env_map = setup_required_env();
        env_map.insert("POOL_ADDRESS".to_string(), "0x1234".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "POOL_ADDRESS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_optional_values() {
        let mut env_map = setup_required_env();
        env_map.insert("BACKFILL_INTERVAL_SECS".to_string(), "300".to_string());
        env_map.insert("METRICS_PORT".to_string(), "9100".to_string());
        env_map.insert("EVENTS_FILE".to_string(), "/tmp/events.jsonl".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.backfill_interval_secs, Some(300));
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.events_file.as_deref(), Some("/tmp/events.jsonl"));
    }

    #[test]
    fn test_parse_assets() {
        let registry = parse_assets(
            r#"[{"address": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", "symbol": "USDC", "decimals": 6}]"#,
        )
        .unwrap();
        let usdc = Address::new("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".to_string());
        assert_eq!(registry.symbol_of(&usdc), "USDC");
        assert_eq!(registry.decimals_of(&usdc), Some(6));
    }

    #[test]
    fn test_parse_assets_invalid_json() {
        assert!(matches!(
            parse_assets("not json"),
            Err(ConfigError::InvalidValue(k, _)) if k == "ASSETS_FILE"
        ));
    }

    #[test]
    fn test_default_assets_when_no_file() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        let registry = config.load_assets().unwrap();
        assert!(!registry.is_empty());
    }
}
