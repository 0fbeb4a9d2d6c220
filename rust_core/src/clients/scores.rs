use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::clients::{PredictionSource, ScoreSource};
use crate::error::{Result, ScoreError};
use crate::models::{GameSnapshot, PredictionRequest, PredictionResponse};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the scores and prediction backend.
#[derive(Clone)]
pub struct ScoresClient {
    client: Client,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for ScoresClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoresClient")
            .field("base_url", &self.base_url)
            .field("circuit_breaker_state", &self.circuit_breaker.state())
            .finish()
    }
}

impl ScoresClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, DEFAULT_TIMEOUT, CircuitBreakerConfig::default())
    }

    pub fn with_config(
        base_url: impl Into<String>,
        timeout: Duration,
        breaker: CircuitBreakerConfig,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            circuit_breaker: Arc::new(CircuitBreaker::new("scores", breaker)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the scores endpoint is available (circuit breaker is not open)
    pub fn is_available(&self) -> bool {
        self.circuit_breaker.is_available()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    pub fn reset_circuit_breaker(&self) {
        self.circuit_breaker.reset();
    }

    /// `GET /api/nba-scores?date=YYYY-MM-DD`
    pub async fn get_games(&self, date: NaiveDate) -> Result<Vec<GameSnapshot>> {
        if !self.circuit_breaker.is_available() {
            return Err(ScoreError::CircuitOpen(
                self.circuit_breaker.name().to_string(),
            ));
        }

        let url = format!("{}/api/nba-scores", self.base_url);
        let date_param = date.format("%Y-%m-%d").to_string();
        let result = self
            .fetch_json::<Vec<GameSnapshot>>(self.client.get(&url).query(&[("date", &date_param)]), &url)
            .await;

        match &result {
            Ok(games) => {
                debug!("Fetched {} games for {}", games.len(), date_param);
                self.circuit_breaker.record_success();
            }
            Err(_) => self.circuit_breaker.record_failure(),
        }

        result
    }

    /// `POST /run-calculations` with `{ "gameId": ... }`
    pub async fn run_calculations(&self, game_id: &str) -> Result<PredictionResponse> {
        let url = format!("{}/run-calculations", self.base_url);
        let body = PredictionRequest {
            game_id: game_id.to_string(),
        };
        self.fetch_json(self.client.post(&url).json(&body), &url).await
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScoreError::Status {
                status,
                url: url.to_string(),
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ScoreSource for ScoresClient {
    async fn fetch_games(&self, date: NaiveDate) -> Result<Vec<GameSnapshot>> {
        self.get_games(date).await
    }
}

#[async_trait]
impl PredictionSource for ScoresClient {
    async fn predict(&self, game_id: &str) -> Result<f64> {
        let resp = self.run_calculations(game_id).await?;
        if let Some(echoed) = resp.game_id.as_deref() {
            if echoed != game_id {
                return Err(ScoreError::InvalidPrediction(format!(
                    "asked for {game_id}, got {echoed}"
                )));
            }
        }
        Ok(resp.home_win_probability)
    }
}
