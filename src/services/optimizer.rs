use crate::error::{GasScopeError, Result};
use crate::models::{AcceptedPrice, SubmissionReceipt};
use crate::services::adjuster::adjust;
use crate::services::chain::ChainClient;
use crate::services::forecaster::Forecaster;
use crate::services::price_feed::PriceFeed;
use crate::services::submitter::TransactionSubmitter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

pub const RETRY_DELAY: Duration = Duration::from_secs(10);
const HISTORY_DUMP_ROWS: usize = 20;

/// Fetch, forecast and compare until the adjusted price is at or below the
/// contract threshold.
///
/// The threshold is read once per [`run`](Self::run). Only a candidate above
/// the threshold leads to another attempt; any feed or forecast error ends the
/// run. There is no attempt limit, cancel through the token instead.
pub struct OptimizationLoop {
    feed: Arc<PriceFeed>,
    forecaster: Arc<Forecaster>,
    chain: Arc<dyn ChainClient>,
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl OptimizationLoop {
    pub fn new(feed: Arc<PriceFeed>, forecaster: Arc<Forecaster>, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            feed,
            forecaster,
            chain,
            retry_delay: RETRY_DELAY,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn run(&self) -> Result<AcceptedPrice> {
        let span = tracing::info_span!("optimize", run_id = %Uuid::new_v4());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<AcceptedPrice> {
        let threshold = self
            .chain
            .threshold()
            .await
            .map_err(|e| GasScopeError::ChainUnavailable(format!("threshold read: {:#}", e)))?;
        tracing::info!(threshold_gwei = threshold, "Smart contract threshold");

        let mut attempts: u64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(GasScopeError::Cancelled { attempts });
            }
            attempts += 1;

            let observed = self.feed.fetch_and_record().await?;
            self.log_recent_history();
            let forecast = self.forecaster.forecast(self.feed.history().as_ref())?;
            let candidate = adjust(observed, forecast);

            tracing::info!(
                attempt = attempts,
                observed_gwei = observed,
                forecast_gwei = forecast,
                candidate_gwei = candidate,
                threshold_gwei = threshold,
                "Optimization attempt"
            );

            if candidate <= threshold as f64 {
                tracing::info!(
                    price_gwei = candidate,
                    attempts,
                    "Optimized gas price accepted (<= threshold)"
                );
                return Ok(AcceptedPrice {
                    price_gwei: candidate,
                    observed_gwei: observed,
                    forecast_gwei: forecast,
                    threshold_gwei: threshold,
                    attempts,
                });
            }

            tracing::info!(
                candidate_gwei = candidate,
                threshold_gwei = threshold,
                retry_in_secs = self.retry_delay.as_secs_f64(),
                "Candidate above threshold, recalculating"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(GasScopeError::Cancelled { attempts });
                }
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }

    fn log_recent_history(&self) {
        match self.feed.history().tail(HISTORY_DUMP_ROWS) {
            Ok(rows) => {
                for row in rows {
                    tracing::debug!(timestamp = %row.timestamp, price_gwei = row.price_gwei, "history");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Could not read history for display"),
        }
    }
}

/// Runs the loop to acceptance and submits the accepted price. Nothing is
/// submitted if the loop fails.
pub async fn optimize_and_execute(
    optimizer: &OptimizationLoop,
    submitter: &TransactionSubmitter,
) -> Result<SubmissionReceipt> {
    let accepted = optimizer.run().await?;
    submitter.submit(accepted.price_gwei).await
}
