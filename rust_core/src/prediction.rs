//! On-demand pregame win prediction.
//!
//! The backend answers with a home win fraction; the board stores both sides
//! as percentages rounded to two decimals, visitor derived as the complement.

use crate::clients::PredictionSource;
use crate::error::{Result, ScoreError};
use crate::models::PredictionStatus;
use crate::store::ScoreboardStore;
use tracing::{debug, info, warn};

/// Home and visitor win percentages for one game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinProbabilities {
    pub home: f64,
    pub visitor: f64,
}

impl WinProbabilities {
    /// Convert a home win fraction in [0, 1] into a percentage pair.
    pub fn from_home_fraction(fraction: f64) -> Result<Self> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(ScoreError::InvalidPrediction(format!(
                "home win fraction {fraction} outside [0, 1]"
            )));
        }
        let home = round2(100.0 * fraction);
        let visitor = round2(100.0 - home);
        Ok(Self { home, visitor })
    }
}

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Outcome of a prediction trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PredictionOutcome {
    Computed(WinProbabilities),
    /// Refused before any request was sent
    Skipped(PredictionStatus),
    /// Answer arrived but the game was gone or already filled in
    Dropped,
    Failed,
}

/// Request a prediction for `game_id` and write it onto the board.
///
/// Refused when the game is unknown, already computed, or already in flight.
/// Failures are logged and leave the game retryable.
pub async fn request_prediction<P>(
    source: &P,
    store: &ScoreboardStore,
    game_id: &str,
) -> PredictionOutcome
where
    P: PredictionSource + ?Sized,
{
    if let Err(status) = store.begin_prediction(game_id) {
        debug!("Prediction for {} not started (status={:?})", game_id, status);
        return PredictionOutcome::Skipped(status);
    }

    let result = source
        .predict(game_id)
        .await
        .and_then(WinProbabilities::from_home_fraction);

    match result {
        Ok(probs) => {
            if store.complete_prediction(game_id, probs) {
                info!(
                    "Prediction for {}: home {:.2}% / visitor {:.2}%",
                    game_id, probs.home, probs.visitor
                );
                PredictionOutcome::Computed(probs)
            } else {
                debug!("Game {} left the board before its prediction arrived", game_id);
                PredictionOutcome::Dropped
            }
        }
        Err(e) => {
            warn!("Error running calculations for {}: {}", game_id, e);
            store.fail_prediction(game_id);
            PredictionOutcome::Failed
        }
    }
}
