//! Hoopwatch Core - live basketball scores and on-demand win predictions.
//!
//! This module provides:
//! - Game snapshot model and wire parsing
//! - Reconciliation of polled snapshots with client-computed win probabilities
//! - Interval polling with supersession of stale requests
//! - On-demand prediction requests with an in-flight guard
//! - HTTP client for the scores backend, guarded by a circuit breaker

pub mod circuit_breaker;
pub mod clients;
pub mod error;
pub mod models;
pub mod poller;
pub mod prediction;
pub mod reconcile;
pub mod store;

pub use clients::{PredictionSource, ScoreSource, ScoresClient};
pub use error::{Result, ScoreError};
pub use models::{GameCollection, GameSnapshot, GameState, PredictionStatus, TeamSnapshot};
pub use poller::{PollHandle, Poller};
pub use prediction::{request_prediction, PredictionOutcome, WinProbabilities};
pub use reconcile::reconcile;
pub use store::{BoardSnapshot, CycleToken, ScoreboardStore};
