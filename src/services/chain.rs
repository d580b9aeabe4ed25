use crate::contracts::GasOptimizer;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ethers::{
    prelude::*,
    providers::{Http, Provider},
    types::{Address, Bytes, H256, U256},
};
use std::sync::Arc;

/// The on-chain surface the optimizer depends on: the contract threshold,
/// the submitter's nonce and raw transaction broadcast.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current `threshold()` of the GasOptimizer contract, in Gwei.
    async fn threshold(&self) -> Result<u64>;

    /// Transaction count of `account` at the latest block.
    async fn transaction_count(&self, account: Address) -> Result<U256>;

    /// Broadcasts an RLP-encoded signed transaction and returns its hash.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256>;
}

pub struct EthereumChain {
    provider: Arc<Provider<Http>>,
    contract: GasOptimizer<Provider<Http>>,
}

impl EthereumChain {
    pub async fn new(rpc_url: &str, contract_address: Address) -> Result<Self> {
        let provider = Arc::new(
            Provider::<Http>::try_from(rpc_url).context("Invalid RPC URL")?,
        );

        // Test connection
        let block_number = provider
            .get_block_number()
            .await
            .context("RPC connection failed")?;
        tracing::info!("Ethereum RPC connected, current block: {}", block_number);

        let contract = GasOptimizer::new(contract_address, provider.clone());
        tracing::info!("Connected to GasOptimizer at {:?}", contract_address);

        Ok(Self { provider, contract })
    }
}

#[async_trait]
impl ChainClient for EthereumChain {
    async fn threshold(&self) -> Result<u64> {
        let value = self
            .contract
            .threshold()
            .call()
            .await
            .context("threshold() call failed")?;

        if value > U256::from(u64::MAX) {
            bail!("threshold {} does not fit in u64", value);
        }
        Ok(value.as_u64())
    }

    async fn transaction_count(&self, account: Address) -> Result<U256> {
        self.provider
            .get_transaction_count(account, None)
            .await
            .context("Failed to read account nonce")
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<H256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .context("Failed to broadcast transaction")?;
        Ok(pending.tx_hash())
    }
}
