use crate::contracts::ExecuteTransactionCall;
use crate::error::{GasScopeError, Result};
use crate::models::SubmissionReceipt;
use crate::services::chain::ChainClient;
use ethers::{
    abi::AbiEncode,
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, TransactionRequest, U256},
    utils::parse_units,
};
use std::sync::Arc;

pub const GAS_LIMIT: u64 = 200_000;

/// Converts a Gwei price to wei, rounding to the nearest wei.
pub fn gwei_to_wei(price_gwei: f64) -> Result<U256> {
    if !price_gwei.is_finite() || price_gwei < 0.0 {
        return Err(GasScopeError::SubmissionFailed(format!(
            "invalid gas price {} Gwei",
            price_gwei
        )));
    }
    let units = parse_units(format!("{:.9}", price_gwei), "gwei")
        .map_err(|e| GasScopeError::SubmissionFailed(format!("gas price conversion: {}", e)))?;
    Ok(units.into())
}

/// Builds, signs and broadcasts the `executeTransaction()` call with the
/// accepted price as the bid. Never retries.
pub struct TransactionSubmitter {
    chain: Arc<dyn ChainClient>,
    wallet: LocalWallet,
    contract: Address,
}

impl TransactionSubmitter {
    /// `wallet` must already be bound to the target chain id.
    pub fn new(chain: Arc<dyn ChainClient>, wallet: LocalWallet, contract: Address) -> Self {
        Self {
            chain,
            wallet,
            contract,
        }
    }

    pub fn account(&self) -> Address {
        self.wallet.address()
    }

    pub fn build_transaction(&self, accepted_price_gwei: f64, nonce: U256) -> Result<TypedTransaction> {
        let gas_price = gwei_to_wei(accepted_price_gwei)?;

        let request = TransactionRequest::new()
            .from(self.wallet.address())
            .to(self.contract)
            .data(ExecuteTransactionCall::default().encode())
            .gas(GAS_LIMIT)
            .gas_price(gas_price)
            .nonce(nonce)
            .chain_id(self.wallet.chain_id());

        Ok(request.into())
    }

    pub async fn submit(&self, accepted_price_gwei: f64) -> Result<SubmissionReceipt> {
        let nonce = self
            .chain
            .transaction_count(self.wallet.address())
            .await
            .map_err(|e| GasScopeError::SubmissionFailed(format!("nonce lookup: {:#}", e)))?;

        let tx = self.build_transaction(accepted_price_gwei, nonce)?;
        let gas_price_wei = tx.gas_price().unwrap_or_default();

        let signature = self
            .wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| GasScopeError::SubmissionFailed(format!("signing: {}", e)))?;
        let raw = tx.rlp_signed(&signature);

        tracing::info!(
            nonce = %nonce,
            gas_price_gwei = accepted_price_gwei,
            gas_limit = GAS_LIMIT,
            chain_id = self.wallet.chain_id(),
            "Broadcasting executeTransaction()"
        );

        let tx_hash = self
            .chain
            .send_raw_transaction(raw)
            .await
            .map_err(|e| GasScopeError::SubmissionFailed(format!("broadcast: {:#}", e)))?;

        tracing::info!(tx_hash = ?tx_hash, "Transaction sent successfully");

        Ok(SubmissionReceipt {
            tx_hash,
            nonce,
            gas_price_wei,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use ethers::types::{Bytes, H256, U64};
    use std::sync::Mutex;

    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    struct FakeChain {
        nonce: u64,
        fail_broadcast: bool,
        sent: Mutex<Vec<Bytes>>,
    }

    impl FakeChain {
        fn new(nonce: u64, fail_broadcast: bool) -> Self {
            Self {
                nonce,
                fail_broadcast,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn threshold(&self) -> anyhow::Result<u64> {
            Ok(5)
        }

        async fn transaction_count(&self, _account: Address) -> anyhow::Result<U256> {
            Ok(U256::from(self.nonce))
        }

        async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<H256> {
            self.sent.lock().unwrap().push(raw);
            if self.fail_broadcast {
                Err(anyhow!("nonce too low"))
            } else {
                Ok(H256::repeat_byte(0xab))
            }
        }
    }

    fn wallet() -> LocalWallet {
        TEST_KEY.parse::<LocalWallet>().unwrap().with_chain_id(11_155_111u64)
    }

    fn contract() -> Address {
        "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap()
    }

    #[test]
    fn test_gwei_to_wei() {
        assert_eq!(gwei_to_wei(3.0).unwrap(), U256::from(3_000_000_000u64));
        assert_eq!(gwei_to_wei(2.8).unwrap(), U256::from(2_800_000_000u64));
        assert_eq!(gwei_to_wei(0.0).unwrap(), U256::zero());
        assert!(gwei_to_wei(-1.0).is_err());
        assert!(gwei_to_wei(f64::NAN).is_err());
    }

    #[test]
    fn test_build_transaction_fields() {
        let chain = Arc::new(FakeChain::new(7, false));
        let submitter = TransactionSubmitter::new(chain, wallet(), contract());

        let tx = submitter.build_transaction(3.0, U256::from(7)).unwrap();
        assert_eq!(tx.gas_price(), Some(U256::from(3_000_000_000u64)));
        assert_eq!(tx.nonce(), Some(&U256::from(7)));
        assert_eq!(tx.gas(), Some(&U256::from(GAS_LIMIT)));
        assert_eq!(tx.chain_id(), Some(U64::from(11_155_111u64)));
        assert_eq!(tx.to_addr(), Some(&contract()));
        assert_eq!(tx.from(), Some(&wallet().address()));
        assert_eq!(
            tx.data().map(|d| d.to_vec()),
            Some(ExecuteTransactionCall::default().encode())
        );
    }

    #[tokio::test]
    async fn test_submit_signs_and_broadcasts_once() {
        let chain = Arc::new(FakeChain::new(7, false));
        let submitter = TransactionSubmitter::new(chain.clone(), wallet(), contract());

        let receipt = submitter.submit(3.0).await.unwrap();
        assert_eq!(receipt.tx_hash, H256::repeat_byte(0xab));
        assert_eq!(receipt.nonce, U256::from(7));
        assert_eq!(receipt.gas_price_wei, U256::from(3_000_000_000u64));

        let sent = chain.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);

        let tx = submitter.build_transaction(3.0, U256::from(7)).unwrap();
        let signature = wallet().sign_transaction_sync(&tx).unwrap();
        assert_eq!(sent[0], tx.rlp_signed(&signature));
    }

    #[tokio::test]
    async fn test_broadcast_failure_is_not_retried() {
        let chain = Arc::new(FakeChain::new(7, true));
        let submitter = TransactionSubmitter::new(chain.clone(), wallet(), contract());

        let result = submitter.submit(3.0).await;
        assert!(matches!(result, Err(GasScopeError::SubmissionFailed(_))));
        assert_eq!(chain.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_price_never_broadcasts() {
        let chain = Arc::new(FakeChain::new(0, false));
        let submitter = TransactionSubmitter::new(chain.clone(), wallet(), contract());

        assert!(matches!(
            submitter.submit(f64::INFINITY).await,
            Err(GasScopeError::SubmissionFailed(_))
        ));
        assert!(chain.sent.lock().unwrap().is_empty());
    }
}
