//! Blends the live observation with the model forecast into the candidate
//! bid used for the threshold decision.

use crate::services::forecaster::round_to;

/// Weight of the forecast in the blend; the observation gets the rest.
pub const FORECAST_WEIGHT: f64 = 0.1;
/// Fixed Gwei offset subtracted after blending.
pub const OFFSET_GWEI: f64 = 0.02;
/// The threshold is expressed at ten times the quoted unit.
pub const UNIT_SCALE: f64 = 10.0;

/// Full-precision optimized price. This is the value the loop compares and
/// bids with.
pub fn adjust(observed_price: f64, raw_forecast: f64) -> f64 {
    let blended = (observed_price + FORECAST_WEIGHT * (raw_forecast - observed_price)) - OFFSET_GWEI;
    blended * UNIT_SCALE
}

/// Display-only variant of [`adjust`], rounded to 3 decimals. Never feed this
/// back into a decision.
pub fn preview(observed_price: f64, raw_forecast: f64) -> f64 {
    round_to(adjust(observed_price, raw_forecast), 3)
}
