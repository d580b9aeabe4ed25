//! In-memory fakes for the chain and quote boundaries.

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256, U256};
use gasscope::error::{GasScopeError, Result};
use gasscope::services::{ChainClient, QuoteSource, SequenceModel};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

pub const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const SEPOLIA: u64 = 11_155_111;

pub fn wallet() -> LocalWallet {
    TEST_KEY.parse::<LocalWallet>().unwrap().with_chain_id(SEPOLIA)
}

pub fn contract() -> Address {
    "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap()
}

/// Quote source that replays a fixed script and records when it was called.
pub struct ScriptedQuotes {
    script: Mutex<VecDeque<Result<f64>>>,
    calls: Mutex<Vec<Instant>>,
    repeat_last: Option<f64>,
}

impl ScriptedQuotes {
    pub fn new(prices: &[f64]) -> Self {
        Self {
            script: Mutex::new(prices.iter().copied().map(Ok).collect()),
            calls: Mutex::new(Vec::new()),
            repeat_last: None,
        }
    }

    /// Returns `price` forever.
    pub fn constant(price: f64) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            repeat_last: Some(price),
        }
    }

    pub fn with_results(results: Vec<Result<f64>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            calls: Mutex::new(Vec::new()),
            repeat_last: None,
        }
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuotes {
    async fn latest_price(&self) -> Result<f64> {
        self.calls.lock().unwrap().push(Instant::now());
        match self.script.lock().unwrap().pop_front() {
            Some(result) => result,
            None => self
                .repeat_last
                .ok_or_else(|| GasScopeError::FeedUnavailable("script exhausted".into())),
        }
    }
}

pub struct FakeChain {
    threshold: Option<u64>,
    nonce: u64,
    fail_broadcast: bool,
    pub threshold_reads: Mutex<usize>,
    pub sent: Mutex<Vec<Bytes>>,
}

impl FakeChain {
    pub fn new(threshold: u64, nonce: u64) -> Self {
        Self {
            threshold: Some(threshold),
            nonce,
            fail_broadcast: false,
            threshold_reads: Mutex::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            threshold: None,
            ..Self::new(0, 0)
        }
    }

    pub fn failing_broadcast(threshold: u64, nonce: u64) -> Self {
        Self {
            fail_broadcast: true,
            ..Self::new(threshold, nonce)
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn threshold(&self) -> anyhow::Result<u64> {
        *self.threshold_reads.lock().unwrap() += 1;
        self.threshold.ok_or_else(|| anyhow!("connection refused"))
    }

    async fn transaction_count(&self, _account: Address) -> anyhow::Result<U256> {
        Ok(U256::from(self.nonce))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> anyhow::Result<H256> {
        self.sent.lock().unwrap().push(raw);
        if self.fail_broadcast {
            Err(anyhow!("replacement transaction underpriced"))
        } else {
            Ok(H256::repeat_byte(0x42))
        }
    }
}

/// Echoes the most recent value of the window.
pub struct LastValueModel;

impl SequenceModel for LastValueModel {
    fn sequence_len(&self) -> usize {
        24
    }

    fn predict(&self, window: &[f64]) -> anyhow::Result<f64> {
        window
            .last()
            .copied()
            .ok_or_else(|| anyhow!("empty window"))
    }
}
