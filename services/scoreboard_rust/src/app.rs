//! Scoreboard controller: date selection, poll lifecycle and prediction
//! triggers, driven by line commands.

use crate::config::parse_date;
use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use hoopwatch_core::clients::{PredictionSource, ScoreSource};
use hoopwatch_core::prediction::{request_prediction, PredictionOutcome};
use hoopwatch_core::{BoardSnapshot, PollHandle, Poller, ScoreboardStore};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Today,
    Date(NaiveDate),
    /// 1-based card index or game id
    Predict(String),
    Refresh,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();

    let command = match (verb.to_ascii_lowercase().as_str(), arg) {
        ("n" | "next", None) => Command::Next,
        ("p" | "prev", None) => Command::Prev,
        ("t" | "today", None) => Command::Today,
        ("r" | "refresh", None) => Command::Refresh,
        ("q" | "quit" | "exit", None) => Command::Quit,
        ("d" | "date", Some(raw)) => Command::Date(parse_date(raw)?),
        ("predict", Some(target)) => Command::Predict(target.to_string()),
        _ => bail!("Unknown command: {}", line.trim()),
    };
    Ok(Some(command))
}

/// Resolve a game id or card number to a game id on the board.
///
/// Backend ids are all digits, so an exact id match is tried before the
/// card number.
pub fn resolve_game_id(board: &BoardSnapshot, target: &str) -> Option<String> {
    if let Some(game) = board.games.get(target) {
        return Some(game.id.clone());
    }
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| board.games.nth(i))
        .map(|g| g.id.clone())
}

pub struct ScoreboardApp<S>
where
    S: ScoreSource + PredictionSource + 'static,
{
    client: Arc<S>,
    store: Arc<ScoreboardStore>,
    poller: Poller<S>,
    poll: Option<PollHandle>,
    today: Box<dyn Fn() -> NaiveDate + Send + Sync>,
}

impl<S> ScoreboardApp<S>
where
    S: ScoreSource + PredictionSource + 'static,
{
    pub fn new(
        client: Arc<S>,
        store: Arc<ScoreboardStore>,
        poll_interval: StdDuration,
        today: impl Fn() -> NaiveDate + Send + Sync + 'static,
    ) -> Self {
        let poller = Poller::new(client.clone(), store.clone(), poll_interval);
        Self {
            client,
            store,
            poller,
            poll: None,
            today: Box::new(today),
        }
    }

    pub fn store(&self) -> &Arc<ScoreboardStore> {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    /// Switch to `date`: cancel the running poll, then start a new one.
    pub fn select_date(&mut self, date: NaiveDate) {
        if let Some(previous) = self.poll.take() {
            previous.stop();
        }
        self.store.set_date(date);
        self.poll = Some(self.poller.start(date, self.today()));
    }

    /// Move the selection by `days`. Moves past the calendar range are ignored.
    pub fn shift_date(&mut self, days: i64) {
        let current = self.store.date();
        match current.checked_add_signed(Duration::days(days)) {
            Some(date) => self.select_date(date),
            None => warn!("Cannot move {} days from {}", days, current),
        }
    }

    /// Fire a prediction request in the background.
    pub fn predict(&self, target: &str) -> Option<JoinHandle<PredictionOutcome>> {
        let Some(game_id) = resolve_game_id(&self.store.snapshot(), target) else {
            warn!("No game '{}' on the board", target);
            return None;
        };
        let (client, store) = (self.client.clone(), self.store.clone());
        Some(tokio::spawn(async move {
            request_prediction(client.as_ref(), &store, &game_id).await
        }))
    }

    /// Apply a command. Returns false when the app should exit.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Next => self.shift_date(1),
            Command::Prev => self.shift_date(-1),
            Command::Today => {
                let today = self.today();
                self.select_date(today);
            }
            Command::Date(date) => self.select_date(date),
            Command::Predict(target) => {
                self.predict(&target);
            }
            Command::Refresh => {}
            Command::Quit => return false,
        }
        true
    }

    /// Stop polling and wait for the loop to exit
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.poll.take() {
            handle.shutdown().await;
        }
        self.store.invalidate();
        info!("Scoreboard stopped");
    }
}
