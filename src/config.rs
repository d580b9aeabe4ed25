use crate::error::{GasScopeError, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
pub const DEFAULT_QUOTE_URL: &str = "https://api.blocknative.com/gasprices/blockprices";

#[derive(Debug, Clone)]
pub struct Config {
    // Chain
    pub rpc_url: String,
    pub chain_id: u64,
    pub account_address: Address,
    pub private_key: SecretString,
    pub contract_address: Address,

    // Quote source
    pub quote_url: String,
    pub quote_api_key: SecretString,
    pub quote_timeout: Duration,

    // Optimization
    pub retry_delay: Duration,

    // Artifacts
    pub history_path: PathBuf,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| GasScopeError::ConfigurationMissing(key.to_string()))
        };

        let rpc_url = require("RPC_URL")?;
        let private_key = SecretString::new(require("PRIVATE_KEY")?);
        let account_address = parse_address("ACCOUNT_ADDRESS", &require("ACCOUNT_ADDRESS")?)?;
        let quote_api_key = SecretString::new(require("QUOTE_API_KEY")?);

        let contract_address = match get("CONTRACT_ADDRESS") {
            Some(raw) => parse_address("CONTRACT_ADDRESS", &raw)?,
            None => {
                let path = get("CONTRACT_ADDRESS_FILE")
                    .unwrap_or_else(|| "blockchain/GasOptimizer_address.txt".to_string());
                let raw = std::fs::read_to_string(&path).map_err(|_| {
                    GasScopeError::ConfigurationMissing(format!(
                        "CONTRACT_ADDRESS (no address file at {})",
                        path
                    ))
                })?;
                parse_address("CONTRACT_ADDRESS_FILE", raw.trim())?
            }
        };

        let config = Self {
            rpc_url,
            chain_id: parse_or("CHAIN_ID", get("CHAIN_ID"), SEPOLIA_CHAIN_ID)?,
            account_address,
            private_key,
            contract_address,

            quote_url: get("QUOTE_URL").unwrap_or_else(|| DEFAULT_QUOTE_URL.to_string()),
            quote_api_key,
            quote_timeout: Duration::from_secs(parse_or(
                "QUOTE_TIMEOUT_SECS",
                get("QUOTE_TIMEOUT_SECS"),
                10,
            )?),

            retry_delay: Duration::from_secs(parse_or(
                "RETRY_DELAY_SECS",
                get("RETRY_DELAY_SECS"),
                10,
            )?),

            history_path: get("HISTORY_PATH")
                .unwrap_or_else(|| "new_blockchain.csv".to_string())
                .into(),
            model_path: get("MODEL_PATH")
                .unwrap_or_else(|| "gas_model.json".to_string())
                .into(),
            scaler_path: get("SCALER_PATH")
                .unwrap_or_else(|| "gas_scaler.json".to_string())
                .into(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses the signing key into a wallet bound to the configured chain.
    pub fn wallet(&self) -> Result<LocalWallet> {
        let wallet = LocalWallet::from_str(self.private_key.expose_secret())
            .map_err(|_| GasScopeError::InvalidConfiguration("PRIVATE_KEY is not a valid key".into()))?;
        Ok(wallet.with_chain_id(self.chain_id))
    }

    fn validate(&self) -> Result<()> {
        if !self.rpc_url.starts_with("http") {
            return Err(GasScopeError::InvalidConfiguration(
                "RPC_URL must be HTTP(S) URL".into(),
            ));
        }
        if !self.quote_url.starts_with("http") {
            return Err(GasScopeError::InvalidConfiguration(
                "QUOTE_URL must be HTTP(S) URL".into(),
            ));
        }

        let wallet = self.wallet()?;
        if wallet.address() != self.account_address {
            return Err(GasScopeError::InvalidConfiguration(
                "PRIVATE_KEY does not belong to ACCOUNT_ADDRESS".into(),
            ));
        }

        tracing::info!(
            chain_id = self.chain_id,
            account = ?self.account_address,
            contract = ?self.contract_address,
            "Configuration validated"
        );

        Ok(())
    }
}

fn parse_address(var: &str, raw: &str) -> Result<Address> {
    Address::from_str(raw.trim())
        .map_err(|_| GasScopeError::InvalidConfiguration(format!("Invalid address for {}", var)))
}

fn parse_or<T: FromStr>(var: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| GasScopeError::InvalidConfiguration(format!("Invalid {}", var))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Hardhat's first development account.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ACCOUNT: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("RPC_URL", "https://sepolia.example.org".to_string()),
            ("PRIVATE_KEY", TEST_KEY.to_string()),
            ("ACCOUNT_ADDRESS", TEST_ACCOUNT.to_string()),
            ("QUOTE_API_KEY", "BN.test-key".to_string()),
            (
                "CONTRACT_ADDRESS",
                "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string(),
            ),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.chain_id, SEPOLIA_CHAIN_ID);
        assert_eq!(config.quote_url, DEFAULT_QUOTE_URL);
        assert_eq!(config.retry_delay, Duration::from_secs(10));
        assert_eq!(config.quote_timeout, Duration::from_secs(10));
        assert_eq!(config.history_path, PathBuf::from("new_blockchain.csv"));
    }

    #[test]
    fn test_each_required_variable_is_fatal() {
        for key in ["RPC_URL", "PRIVATE_KEY", "ACCOUNT_ADDRESS", "QUOTE_API_KEY"] {
            let mut env = base_env();
            env.remove(key);
            match load(&env) {
                Err(GasScopeError::ConfigurationMissing(name)) => assert_eq!(name, key),
                other => panic!("expected missing {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("QUOTE_API_KEY", "   ".to_string());
        assert!(matches!(
            load(&env),
            Err(GasScopeError::ConfigurationMissing(_))
        ));
    }

    #[test]
    fn test_contract_address_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("address.txt");
        std::fs::write(&path, "0x5FbDB2315678afecb367f032d93F642f64180aa3\n").unwrap();

        let mut env = base_env();
        env.remove("CONTRACT_ADDRESS");
        env.insert("CONTRACT_ADDRESS_FILE", path.display().to_string());

        let config = load(&env).unwrap();
        assert_eq!(
            config.contract_address,
            Address::from_str("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap()
        );
    }

    #[test]
    fn test_key_must_match_account() {
        let mut env = base_env();
        env.insert(
            "ACCOUNT_ADDRESS",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".to_string(),
        );
        assert!(matches!(
            load(&env),
            Err(GasScopeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_private_key_is_redacted() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains(&TEST_KEY[2..]));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let mut env = base_env();
        env.insert("RETRY_DELAY_SECS", "ten".to_string());
        assert!(matches!(
            load(&env),
            Err(GasScopeError::InvalidConfiguration(_))
        ));
    }
}
