use crate::error::{GasScopeError, Result};
use crate::services::history::HistoryLog;
use crate::services::model::{ModelArtifacts, Scaler, SequenceModel};

/// Number of most recent valid prices considered.
pub const HISTORY_WINDOW: usize = 100;
/// Number of trailing values the model consumes.
pub const SEQUENCE_LEN: usize = 24;

pub struct Forecaster {
    model: Box<dyn SequenceModel>,
    scaler: Box<dyn Scaler>,
}

impl Forecaster {
    pub fn new(model: Box<dyn SequenceModel>, scaler: Box<dyn Scaler>) -> Result<Self> {
        if model.sequence_len() != SEQUENCE_LEN {
            return Err(GasScopeError::ForecastFailed(format!(
                "model consumes {} values, expected {}",
                model.sequence_len(),
                SEQUENCE_LEN
            )));
        }
        Ok(Self { model, scaler })
    }

    pub fn from_artifacts(artifacts: ModelArtifacts) -> Result<Self> {
        Self::new(artifacts.model, artifacts.scaler)
    }

    /// Forecasts the next gas price from the trailing history, rounded to
    /// 2 decimals.
    pub fn forecast(&self, history: &dyn HistoryLog) -> Result<f64> {
        let series = history.recent_prices(HISTORY_WINDOW)?;
        if series.len() < SEQUENCE_LEN {
            return Err(GasScopeError::InsufficientHistory {
                available: series.len(),
                required: SEQUENCE_LEN,
            });
        }

        let scaled = self
            .scaler
            .transform(&series)
            .map_err(|e| GasScopeError::ForecastFailed(format!("scaler transform: {:#}", e)))?;
        if scaled.len() != series.len() {
            return Err(GasScopeError::ForecastFailed(format!(
                "scaler returned {} values for {} inputs",
                scaled.len(),
                series.len()
            )));
        }

        let window = &scaled[scaled.len() - SEQUENCE_LEN..];
        let prediction = self
            .model
            .predict(window)
            .map_err(|e| GasScopeError::ForecastFailed(format!("model predict: {:#}", e)))?;

        let restored = self
            .scaler
            .inverse_transform(&[prediction])
            .map_err(|e| GasScopeError::ForecastFailed(format!("scaler inverse: {:#}", e)))?;
        let predicted = restored
            .first()
            .copied()
            .filter(|v| v.is_finite())
            .ok_or_else(|| {
                GasScopeError::ForecastFailed("model produced no finite prediction".into())
            })?;

        let rounded = round_to(predicted, 2);
        tracing::debug!(
            window = SEQUENCE_LEN,
            available = series.len(),
            raw = predicted,
            forecast_gwei = rounded,
            "Forecast computed"
        );
        Ok(rounded)
    }
}

/// Rounds the exact binary value to `decimals` places, ties to even.
pub(crate) fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}
