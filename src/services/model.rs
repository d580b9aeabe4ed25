//! Forecast model capability.
//!
//! The forecaster only sees two narrow traits: a fitted single-feature
//! [`Scaler`] and a [`SequenceModel`] that maps a fixed-length scaled window
//! to one scaled prediction. The concrete artifacts here are loaded from JSON
//! files produced offline by the training pipeline.

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub trait Scaler: Send + Sync {
    fn transform(&self, values: &[f64]) -> Result<Vec<f64>>;
    fn inverse_transform(&self, values: &[f64]) -> Result<Vec<f64>>;
}

pub trait SequenceModel: Send + Sync {
    /// Number of trailing values the model consumes.
    fn sequence_len(&self) -> usize;

    fn predict(&self, window: &[f64]) -> Result<f64>;
}

/// Fitted min-max scaler over one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub data_min: f64,
    pub data_max: f64,
    #[serde(default = "default_feature_range")]
    pub feature_range: (f64, f64),
}

fn default_feature_range() -> (f64, f64) {
    (0.0, 1.0)
}

impl MinMaxScaler {
    pub fn new(data_min: f64, data_max: f64) -> Result<Self> {
        let scaler = Self {
            data_min,
            data_max,
            feature_range: default_feature_range(),
        };
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scaler {}", path.display()))?;
        let scaler: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid scaler file {}", path.display()))?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.data_min.is_finite() && self.data_max.is_finite(),
            "scaler bounds must be finite"
        );
        ensure!(
            self.feature_range.1 > self.feature_range.0,
            "scaler feature_range must be increasing"
        );
        Ok(())
    }

    fn scale(&self) -> f64 {
        let span = self.data_max - self.data_min;
        // Constant features map onto the lower bound, as sklearn does.
        let span = if span == 0.0 { 1.0 } else { span };
        (self.feature_range.1 - self.feature_range.0) / span
    }
}

impl Scaler for MinMaxScaler {
    fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        let scale = self.scale();
        Ok(values
            .iter()
            .map(|v| (v - self.data_min) * scale + self.feature_range.0)
            .collect())
    }

    fn inverse_transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        let scale = self.scale();
        Ok(values
            .iter()
            .map(|v| (v - self.feature_range.0) / scale + self.data_min)
            .collect())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScaler;

impl Scaler for IdentityScaler {
    fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        Ok(values.to_vec())
    }

    fn inverse_transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        Ok(values.to_vec())
    }
}

/// Linear autoregressive head: `bias + sum(weights[i] * window[i])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSequenceModel {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

impl LinearSequenceModel {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model {}", path.display()))?;
        let model: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid model file {}", path.display()))?;
        ensure!(!model.weights.is_empty(), "model has no weights");
        ensure!(
            model.weights.iter().all(|w| w.is_finite()) && model.bias.is_finite(),
            "model parameters must be finite"
        );
        Ok(model)
    }
}

impl SequenceModel for LinearSequenceModel {
    fn sequence_len(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, window: &[f64]) -> Result<f64> {
        if window.len() != self.weights.len() {
            bail!(
                "model expects a window of {} values, got {}",
                self.weights.len(),
                window.len()
            );
        }
        Ok(self.bias
            + self
                .weights
                .iter()
                .zip(window)
                .map(|(w, x)| w * x)
                .sum::<f64>())
    }
}

/// Loaded model and scaler, ready to hand to the forecaster.
pub struct ModelArtifacts {
    pub model: Box<dyn SequenceModel>,
    pub scaler: Box<dyn Scaler>,
}

impl ModelArtifacts {
    pub fn load(model_path: impl AsRef<Path>, scaler_path: impl AsRef<Path>) -> Result<Self> {
        tracing::info!("Loading forecast model and scaler...");
        let model = LinearSequenceModel::from_file(model_path)?;
        let scaler = MinMaxScaler::from_file(scaler_path)?;
        tracing::info!(
            sequence_len = model.sequence_len(),
            data_min = scaler.data_min,
            data_max = scaler.data_max,
            "Model and scaler loaded"
        );
        Ok(Self {
            model: Box::new(model),
            scaler: Box::new(scaler),
        })
    }
}
