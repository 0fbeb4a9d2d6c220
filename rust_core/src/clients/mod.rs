//! Backend access.
//!
//! The poller and the prediction trigger only see these traits, so tests can
//! drive them with scripted sources.

pub mod scores;

pub use scores::ScoresClient;

use crate::error::Result;
use crate::models::GameSnapshot;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// Source of game snapshots for a calendar date
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn fetch_games(&self, date: NaiveDate) -> Result<Vec<GameSnapshot>>;
}

/// Source of pregame predictions
#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Home team win fraction in [0, 1]
    async fn predict(&self, game_id: &str) -> Result<f64>;
}

#[async_trait]
impl<T: ScoreSource + ?Sized> ScoreSource for Arc<T> {
    async fn fetch_games(&self, date: NaiveDate) -> Result<Vec<GameSnapshot>> {
        (**self).fetch_games(date).await
    }
}

#[async_trait]
impl<T: PredictionSource + ?Sized> PredictionSource for Arc<T> {
    async fn predict(&self, game_id: &str) -> Result<f64> {
        (**self).predict(game_id).await
    }
}
