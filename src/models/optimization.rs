use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};

/// Outcome of an optimization run that reached the Accepted state.
///
/// `price_gwei` keeps full precision; it is both the decision value and the
/// bid used for the transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedPrice {
    pub price_gwei: f64,
    pub observed_gwei: f64,
    pub forecast_gwei: f64,
    pub threshold_gwei: u64,
    pub attempts: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub tx_hash: H256,
    pub nonce: U256,
    pub gas_price_wei: U256,
}
