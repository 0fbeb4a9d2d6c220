//! Board state shared between the poller, prediction tasks and the view.
//!
//! All mutation goes through [`ScoreboardStore`] methods. Poll results are
//! applied only while their [`CycleToken`] is still the current one, checked
//! under the same write lock that installs the new collection.

use crate::models::{GameCollection, GameSnapshot, PredictionStatus};
use crate::prediction::WinProbabilities;
use crate::reconcile::reconcile;
use chrono::NaiveDate;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Validity token for one poll cycle.
///
/// Starting a newer cycle, changing the date, or tearing the poller down
/// invalidates it: its cancellation fires and its epoch stops matching.
#[derive(Debug, Clone)]
pub struct CycleToken {
    epoch: u64,
    date: NaiveDate,
    cancel: CancellationToken,
}

impl CycleToken {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Date selected when the cycle began
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the cycle has been superseded or torn down
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// Read-only copy of the board handed to the view.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub date: NaiveDate,
    pub games: GameCollection,
    /// True until the first poll for the session completes
    pub loading: bool,
    pub error: Option<String>,
    pub predictions_in_flight: FxHashSet<String>,
}

impl BoardSnapshot {
    pub fn prediction_status(&self, game: &GameSnapshot) -> PredictionStatus {
        if self.predictions_in_flight.contains(&game.id) {
            PredictionStatus::Requested
        } else if game.has_win_probabilities() {
            PredictionStatus::Computed
        } else {
            PredictionStatus::Unrequested
        }
    }
}

#[derive(Debug)]
struct BoardState {
    date: NaiveDate,
    games: GameCollection,
    loading: bool,
    error: Option<String>,
    in_flight: FxHashSet<String>,
    epoch: u64,
    cycle_cancel: Option<CancellationToken>,
}

pub struct ScoreboardStore {
    state: RwLock<BoardState>,
    version: watch::Sender<u64>,
}

impl std::fmt::Debug for ScoreboardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ScoreboardStore")
            .field("date", &state.date)
            .field("games", &state.games.len())
            .field("epoch", &state.epoch)
            .finish()
    }
}

impl ScoreboardStore {
    pub fn new(date: NaiveDate) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: RwLock::new(BoardState {
                date,
                games: GameCollection::new(),
                loading: true,
                error: None,
                in_flight: FxHashSet::default(),
                epoch: 0,
                cycle_cancel: None,
            }),
            version,
        }
    }

    /// Receiver that ticks on every visible change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let state = self.state.read();
        BoardSnapshot {
            date: state.date,
            games: state.games.clone(),
            loading: state.loading,
            error: state.error.clone(),
            predictions_in_flight: state.in_flight.clone(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.state.read().date
    }

    // ------------------------------------------------------------------
    // Poll lifecycle
    // ------------------------------------------------------------------

    /// Select a new date. Any cycle for the previous date is invalidated.
    pub fn set_date(&self, date: NaiveDate) {
        {
            let mut state = self.state.write();
            Self::invalidate_locked(&mut state);
            state.date = date;
        }
        self.notify();
    }

    /// Invalidate the current cycle without starting another
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        Self::invalidate_locked(&mut state);
    }

    /// Start a cycle fetching `date`, superseding whichever one is
    /// outstanding.
    ///
    /// A loop that was already stopped, or that polls a date other than the
    /// selected one, gets a dead token and leaves the current cycle alone.
    pub fn begin_cycle(&self, parent: &CancellationToken, date: NaiveDate) -> CycleToken {
        let mut state = self.state.write();
        let cancel = parent.child_token();
        if parent.is_cancelled() || date != state.date {
            debug!("Not starting a cycle for {} (selected {})", date, state.date);
            cancel.cancel();
            return CycleToken {
                epoch: state.epoch,
                date,
                cancel,
            };
        }
        Self::invalidate_locked(&mut state);
        state.cycle_cancel = Some(cancel.clone());
        CycleToken {
            epoch: state.epoch,
            date,
            cancel,
        }
    }

    pub fn is_current(&self, token: &CycleToken) -> bool {
        let state = self.state.read();
        Self::is_current_locked(&state, token)
    }

    /// Reconcile `incoming` into the board. Returns false, leaving the board
    /// untouched, when the cycle is no longer current.
    pub fn apply_poll(&self, token: &CycleToken, incoming: Vec<GameSnapshot>) -> bool {
        {
            let mut state = self.state.write();
            if !Self::is_current_locked(&state, token) {
                debug!("Discarding poll result from stale cycle {}", token.epoch);
                return false;
            }
            let next = reconcile(&state.games, incoming);
            state.games = next;
            state.error = None;
            state.loading = false;
        }
        self.notify();
        true
    }

    /// Record a failed poll. Held games are kept.
    pub fn apply_poll_error(&self, token: &CycleToken, message: impl Into<String>) -> bool {
        {
            let mut state = self.state.write();
            if !Self::is_current_locked(&state, token) {
                return false;
            }
            state.error = Some(message.into());
            state.loading = false;
        }
        self.notify();
        true
    }

    fn invalidate_locked(state: &mut BoardState) {
        state.epoch += 1;
        if let Some(cancel) = state.cycle_cancel.take() {
            cancel.cancel();
        }
    }

    fn is_current_locked(state: &BoardState, token: &CycleToken) -> bool {
        token.epoch == state.epoch && token.date == state.date && !token.cancel.is_cancelled()
    }

    // ------------------------------------------------------------------
    // Predictions
    // ------------------------------------------------------------------

    pub fn prediction_status(&self, game_id: &str) -> PredictionStatus {
        let state = self.state.read();
        Self::prediction_status_locked(&state, game_id)
    }

    /// Mark a prediction as in flight.
    ///
    /// Returns the blocking status when the game is missing (`Unrequested`),
    /// already computed, or already requested.
    pub fn begin_prediction(&self, game_id: &str) -> Result<(), PredictionStatus> {
        {
            let mut state = self.state.write();
            if state.games.get(game_id).is_none() {
                return Err(PredictionStatus::Unrequested);
            }
            match Self::prediction_status_locked(&state, game_id) {
                PredictionStatus::Unrequested => {
                    state.in_flight.insert(game_id.to_string());
                }
                blocked => return Err(blocked),
            }
        }
        self.notify();
        Ok(())
    }

    /// Attach computed probabilities. Returns false if the game is gone or
    /// already has probabilities.
    pub fn complete_prediction(&self, game_id: &str, probs: WinProbabilities) -> bool {
        let written = {
            let mut state = self.state.write();
            state.in_flight.remove(game_id);
            match state.games.get_mut(game_id) {
                Some(game) if !game.has_win_probabilities() => {
                    game.home_team.win_probability = Some(probs.home);
                    game.visitor_team.win_probability = Some(probs.visitor);
                    true
                }
                _ => false,
            }
        };
        self.notify();
        written
    }

    pub fn fail_prediction(&self, game_id: &str) {
        self.state.write().in_flight.remove(game_id);
        self.notify();
    }

    fn prediction_status_locked(state: &BoardState, game_id: &str) -> PredictionStatus {
        if state.in_flight.contains(game_id) {
            return PredictionStatus::Requested;
        }
        match state.games.get(game_id) {
            Some(game) if game.has_win_probabilities() => PredictionStatus::Computed,
            _ => PredictionStatus::Unrequested,
        }
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameState, TeamSnapshot};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn game(id: &str, home_score: u32) -> GameSnapshot {
        GameSnapshot {
            id: id.to_string(),
            home_team: TeamSnapshot::new("Nuggets", "DEN", home_score),
            visitor_team: TeamSnapshot::new("Suns", "PHX", 0),
            status_text: "Q1 8:00".to_string(),
            state: GameState::Live,
            last_play_description: String::new(),
            time_left: None,
        }
    }

    #[test]
    fn test_new_store_is_loading_and_empty() {
        let store = ScoreboardStore::new(day(1));
        let snap = store.snapshot();
        assert!(snap.loading);
        assert!(snap.games.is_empty());
        assert_eq!(snap.error, None);
    }

    #[test]
    fn test_apply_poll_clears_error_and_loading() {
        let store = ScoreboardStore::new(day(1));
        let token = store.begin_cycle(&CancellationToken::new(), day(1));
        assert!(store.apply_poll_error(&token, "down"));
        assert_eq!(store.snapshot().error.as_deref(), Some("down"));

        assert!(store.apply_poll(&token, vec![game("g1", 3)]));
        let snap = store.snapshot();
        assert!(!snap.loading);
        assert_eq!(snap.error, None);
        assert_eq!(snap.games.len(), 1);
    }

    #[test]
    fn test_error_keeps_existing_games() {
        let store = ScoreboardStore::new(day(1));
        let token = store.begin_cycle(&CancellationToken::new(), day(1));
        store.apply_poll(&token, vec![game("g1", 3)]);
        store.apply_poll_error(&token, "down");
        assert_eq!(store.snapshot().games.len(), 1);
    }

    #[test]
    fn test_newer_cycle_invalidates_older() {
        let store = ScoreboardStore::new(day(1));
        let parent = CancellationToken::new();
        let old = store.begin_cycle(&parent, day(1));
        let new = store.begin_cycle(&parent, day(1));

        assert!(old.is_cancelled());
        assert!(!store.apply_poll(&old, vec![game("stale", 1)]));
        assert!(!store.apply_poll_error(&old, "late failure"));
        assert!(store.apply_poll(&new, vec![game("fresh", 1)]));

        let snap = store.snapshot();
        assert!(snap.games.get("stale").is_none());
        assert!(snap.games.get("fresh").is_some());
        assert_eq!(snap.error, None);
    }

    #[test]
    fn test_date_change_invalidates_cycle() {
        let store = ScoreboardStore::new(day(1));
        let token = store.begin_cycle(&CancellationToken::new(), day(1));
        store.set_date(day(2));
        assert!(!store.is_current(&token));
        assert!(!store.apply_poll(&token, vec![game("g1", 1)]));
        assert_eq!(store.date(), day(2));
    }

    #[test]
    fn test_loop_for_previous_date_cannot_supersede() {
        let store = ScoreboardStore::new(day(1));
        let old_loop = CancellationToken::new();
        store.set_date(day(2));
        let current = store.begin_cycle(&CancellationToken::new(), day(2));

        // Loop for day 1 was never stopped and keeps ticking
        let stale = store.begin_cycle(&old_loop, day(1));
        assert!(stale.is_cancelled());
        assert_eq!(stale.date(), day(1));
        assert!(!store.apply_poll(&stale, vec![game("from-d1", 1)]));
        assert!(!store.apply_poll_error(&stale, "late failure"));

        assert!(store.is_current(&current));
        assert!(store.apply_poll(&current, vec![game("from-d2", 1)]));
        let snap = store.snapshot();
        assert_eq!(snap.games.ids().collect::<Vec<_>>(), vec!["from-d2"]);
        assert_eq!(snap.error, None);
    }

    #[test]
    fn test_parent_cancellation_invalidates_cycle() {
        let store = ScoreboardStore::new(day(1));
        let parent = CancellationToken::new();
        let token = store.begin_cycle(&parent, day(1));
        parent.cancel();
        assert!(!store.apply_poll(&token, vec![game("g1", 1)]));
    }

    #[test]
    fn test_stopped_loop_cannot_supersede_current_cycle() {
        let store = ScoreboardStore::new(day(1));
        let stopped = CancellationToken::new();
        stopped.cancel();
        let current = store.begin_cycle(&CancellationToken::new(), day(1));

        let dead = store.begin_cycle(&stopped, day(1));
        assert!(dead.is_cancelled());
        assert!(store.is_current(&current));
        assert!(store.apply_poll(&current, vec![game("g1", 1)]));
    }

    #[test]
    fn test_prediction_lifecycle() {
        let store = ScoreboardStore::new(day(1));
        let token = store.begin_cycle(&CancellationToken::new(), day(1));
        store.apply_poll(&token, vec![game("g1", 0)]);

        assert_eq!(store.prediction_status("g1"), PredictionStatus::Unrequested);
        assert_eq!(store.begin_prediction("missing"), Err(PredictionStatus::Unrequested));
        assert_eq!(store.begin_prediction("g1"), Ok(()));
        assert_eq!(store.begin_prediction("g1"), Err(PredictionStatus::Requested));

        let probs = WinProbabilities { home: 62.35, visitor: 37.65 };
        assert!(store.complete_prediction("g1", probs));
        assert_eq!(store.prediction_status("g1"), PredictionStatus::Computed);
        assert_eq!(store.begin_prediction("g1"), Err(PredictionStatus::Computed));

        // Later refreshes keep the computed values
        store.apply_poll(&token, vec![game("g1", 12)]);
        let snap = store.snapshot();
        let g = snap.games.get("g1").unwrap();
        assert_eq!(g.home_team.score, 12);
        assert_eq!(g.home_team.win_probability, Some(62.35));
        assert_eq!(snap.prediction_status(g), PredictionStatus::Computed);
    }

    #[test]
    fn test_prediction_for_departed_game_is_dropped() {
        let store = ScoreboardStore::new(day(1));
        let token = store.begin_cycle(&CancellationToken::new(), day(1));
        store.apply_poll(&token, vec![game("g1", 0)]);
        store.begin_prediction("g1").unwrap();
        store.apply_poll(&token, vec![game("g2", 0)]);

        let probs = WinProbabilities { home: 50.0, visitor: 50.0 };
        assert!(!store.complete_prediction("g1", probs));
        assert!(store.snapshot().predictions_in_flight.is_empty());
    }

    #[test]
    fn test_changes_are_published() {
        let store = ScoreboardStore::new(day(1));
        let mut rx = store.subscribe();
        let token = store.begin_cycle(&CancellationToken::new(), day(1));
        store.apply_poll(&token, vec![game("g1", 0)]);
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert!(!rx.has_changed().unwrap());
    }
}
