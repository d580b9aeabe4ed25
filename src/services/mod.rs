pub mod adjuster;
pub mod chain;
pub mod forecaster;
pub mod history;
pub mod model;
pub mod optimizer;
pub mod price_feed;
pub mod submitter;

pub use chain::{ChainClient, EthereumChain};
pub use forecaster::{Forecaster, HISTORY_WINDOW, SEQUENCE_LEN};
pub use history::{CsvHistory, HistoryLog, MemoryHistory};
pub use model::{
    IdentityScaler, LinearSequenceModel, MinMaxScaler, ModelArtifacts, Scaler, SequenceModel,
};
pub use optimizer::{optimize_and_execute, OptimizationLoop, RETRY_DELAY};
pub use price_feed::{HttpQuoteSource, PriceFeed, QuoteSource};
pub use submitter::{gwei_to_wei, TransactionSubmitter, GAS_LIMIT};
