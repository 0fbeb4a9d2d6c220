//! Periodic score polling.
//!
//! A poll loop owns a cancellation token for its date. Each tick opens a new
//! cycle on the store, which cancels the previous cycle, so a slow response
//! can never land on top of a newer one (last-requested wins). Dates other
//! than today are fetched once and not refreshed.

use crate::clients::ScoreSource;
use crate::error::ScoreError;
use crate::store::{CycleToken, ScoreboardStore};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// User-facing message shown while polling is failing
pub const POLL_ERROR_MESSAGE: &str = "Could not fetch live scores. Is the scores server running?";

/// What happened to one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied,
    Failed,
    /// Superseded or torn down; nothing was written
    Discarded,
}

/// Fetch once for `date` and apply the result if `token` is still current.
pub async fn run_cycle<S>(
    source: &S,
    store: &ScoreboardStore,
    date: NaiveDate,
    token: CycleToken,
) -> CycleOutcome
where
    S: ScoreSource + ?Sized,
{
    let result = tokio::select! {
        biased;
        _ = token.cancelled() => Err(ScoreError::Aborted),
        games = source.fetch_games(date) => games,
    };

    match result {
        Ok(games) => {
            let count = games.len();
            if store.apply_poll(&token, games) {
                debug!("Cycle {} applied {} games for {}", token.epoch(), count, date);
                CycleOutcome::Applied
            } else {
                debug!("Cycle {} finished after being superseded", token.epoch());
                CycleOutcome::Discarded
            }
        }
        Err(e) if e.is_aborted() => {
            debug!("Fetch aborted: newer request is in progress (cycle {})", token.epoch());
            CycleOutcome::Discarded
        }
        Err(e) => {
            if store.apply_poll_error(&token, POLL_ERROR_MESSAGE) {
                error!("Failed to fetch scores for {}: {}", date, e);
                CycleOutcome::Failed
            } else {
                CycleOutcome::Discarded
            }
        }
    }
}

/// Starts poll loops against a shared store.
pub struct Poller<S> {
    source: Arc<S>,
    store: Arc<ScoreboardStore>,
    interval: Duration,
}

impl<S> Poller<S>
where
    S: ScoreSource + 'static,
{
    pub fn new(source: Arc<S>, store: Arc<ScoreboardStore>, interval: Duration) -> Self {
        Self {
            source,
            store,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling `date`. Refreshes repeat only when `date == today`.
    pub fn start(&self, date: NaiveDate, today: NaiveDate) -> PollHandle {
        let cancel = CancellationToken::new();
        let live = date == today;
        info!(
            "Polling scores for {} ({})",
            date,
            if live { "live refresh" } else { "single fetch" }
        );

        let task = tokio::spawn(poll_loop(
            self.source.clone(),
            self.store.clone(),
            date,
            live.then_some(self.interval),
            cancel.clone(),
        ));

        PollHandle {
            date,
            live,
            cancel,
            task: Some(task),
        }
    }
}

async fn poll_loop<S>(
    source: Arc<S>,
    store: Arc<ScoreboardStore>,
    date: NaiveDate,
    refresh: Option<Duration>,
    cancel: CancellationToken,
) where
    S: ScoreSource + 'static,
{
    let Some(every) = refresh else {
        let token = store.begin_cycle(&cancel, date);
        run_cycle(source.as_ref(), &store, date, token).await;
        return;
    };

    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Poll loop for {} shutting down", date);
                break;
            }
            _ = ticker.tick() => {
                let token = store.begin_cycle(&cancel, date);
                let (source, store) = (source.clone(), store.clone());
                tokio::spawn(async move {
                    run_cycle(source.as_ref(), &store, date, token).await;
                });
            }
        }
    }
}

/// Running poll loop. Dropping it cancels the loop and any request in flight.
#[derive(Debug)]
pub struct PollHandle {
    date: NaiveDate,
    live: bool,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Cancel synchronously; late completions become no-ops.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the loop task to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Poll loop task failed: {}", e);
                }
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::{GameSnapshot, GameState, TeamSnapshot};
    use async_trait::async_trait;
    use chrono::Datelike;
    use parking_lot::Mutex;
    use reqwest::StatusCode;

    type Respond = dyn Fn(usize, NaiveDate) -> (Duration, Option<Vec<GameSnapshot>>) + Send + Sync;

    /// Answers each call after a scripted delay; `None` means HTTP 500.
    struct ScriptedSource {
        calls: Mutex<Vec<NaiveDate>>,
        respond: Box<Respond>,
    }

    impl ScriptedSource {
        fn new(
            respond: impl Fn(usize, NaiveDate) -> (Duration, Option<Vec<GameSnapshot>>)
                + Send
                + Sync
                + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl ScoreSource for ScriptedSource {
        async fn fetch_games(&self, date: NaiveDate) -> Result<Vec<GameSnapshot>> {
            let n = {
                let mut calls = self.calls.lock();
                calls.push(date);
                calls.len() - 1
            };
            let (delay, games) = (self.respond)(n, date);
            tokio::time::sleep(delay).await;
            games.ok_or_else(|| ScoreError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                url: "/api/nba-scores".to_string(),
            })
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, d).unwrap()
    }

    fn game(id: &str) -> GameSnapshot {
        GameSnapshot {
            id: id.to_string(),
            home_team: TeamSnapshot::new("Bucks", "MIL", 0),
            visitor_team: TeamSnapshot::new("Bulls", "CHI", 0),
            status_text: String::new(),
            state: GameState::Live,
            last_play_description: String::new(),
            time_left: None,
        }
    }

    fn ids(store: &ScoreboardStore) -> Vec<String> {
        store.snapshot().games.ids().map(str::to_string).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_date_refreshes_on_interval() {
        let source = ScriptedSource::new(|_, _| (Duration::ZERO, Some(vec![game("g1")])));
        let store = Arc::new(ScoreboardStore::new(day(10)));
        let poller = Poller::new(source.clone(), store.clone(), Duration::from_secs(1));

        let handle = poller.start(day(10), day(10));
        assert!(handle.is_live());
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(source.call_count(), 4);
        assert_eq!(ids(&store), vec!["g1"]);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_date_is_fetched_once() {
        let source = ScriptedSource::new(|_, _| (Duration::ZERO, Some(vec![game("g1")])));
        let store = Arc::new(ScoreboardStore::new(day(3)));
        let poller = Poller::new(source.clone(), store.clone(), Duration::from_secs(1));

        let handle = poller.start(day(3), day(10));
        assert!(!handle.is_live());
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(source.call_count(), 1);
        assert!(!store.snapshot().loading);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_for_previous_date_is_discarded() {
        let source = ScriptedSource::new(|_, date| {
            if date == day(1) {
                (Duration::from_secs(5), Some(vec![game("from-d1")]))
            } else {
                (Duration::from_secs(1), Some(vec![game("from-d2")]))
            }
        });
        let store = Arc::new(ScoreboardStore::new(day(1)));
        let poller = Poller::new(source.clone(), store.clone(), Duration::from_secs(1));

        let first = poller.start(day(1), day(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        first.stop();
        store.set_date(day(2));
        let second = poller.start(day(2), day(20));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(ids(&store), vec!["from-d2"]);
        assert_eq!(source.call_count(), 2);
        first.shutdown().await;
        second.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unstopped_loop_for_old_date_never_applies() {
        let source = ScriptedSource::new(|_, date| {
            (Duration::ZERO, Some(vec![game(&format!("from-{}", date.day()))]))
        });
        let store = Arc::new(ScoreboardStore::new(day(1)));
        let poller = Poller::new(source.clone(), store.clone(), Duration::from_secs(1));

        // Both dates count as live so both loops keep ticking
        let old = poller.start(day(1), day(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        store.set_date(day(2));
        let new = poller.start(day(2), day(2));
        tokio::time::sleep(Duration::from_millis(3500)).await;

        assert_eq!(ids(&store), vec!["from-2"]);
        let old_date_calls = source.calls.lock().iter().filter(|d| **d == day(1)).count();
        assert_eq!(old_date_calls, 1);
        old.shutdown().await;
        new.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_superseded_by_newer_cycle() {
        let source = ScriptedSource::new(|n, _| {
            if n == 0 {
                (Duration::from_secs(5), Some(vec![game("old")]))
            } else {
                (Duration::ZERO, Some(vec![game("new")]))
            }
        });
        let store = Arc::new(ScoreboardStore::new(day(10)));
        let poller = Poller::new(source.clone(), store.clone(), Duration::from_secs(1));

        let handle = poller.start(day(10), day(10));
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(ids(&store), vec!["new"]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ids(&store), vec!["new"]);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_sets_error_and_keeps_games() {
        let source = ScriptedSource::new(|n, _| {
            if n == 0 {
                (Duration::ZERO, Some(vec![game("g1")]))
            } else {
                (Duration::ZERO, None)
            }
        });
        let store = Arc::new(ScoreboardStore::new(day(10)));
        let poller = Poller::new(source.clone(), store.clone(), Duration::from_secs(1));

        let handle = poller.start(day(10), day(10));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let snap = store.snapshot();
        assert_eq!(snap.error.as_deref(), Some(POLL_ERROR_MESSAGE));
        assert_eq!(snap.games.len(), 1);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let source = ScriptedSource::new(|_, _| (Duration::ZERO, Some(vec![game("g1")])));
        let store = Arc::new(ScoreboardStore::new(day(10)));
        let poller = Poller::new(source.clone(), store.clone(), Duration::from_secs(1));

        let handle = poller.start(day(10), day(10));
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.shutdown().await;
        let calls = source.call_count();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.call_count(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_cycle_is_not_an_error() {
        let source = ScriptedSource::new(|_, _| (Duration::from_secs(5), None));
        let store = ScoreboardStore::new(day(10));
        let token = store.begin_cycle(&CancellationToken::new(), day(10));

        let cycle = run_cycle(source.as_ref(), &store, day(10), token);
        let cancel_later = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            store.invalidate();
        };
        let (outcome, _) = tokio::join!(cycle, cancel_later);

        assert_eq!(outcome, CycleOutcome::Discarded);
        assert_eq!(store.snapshot().error, None);
    }
}
