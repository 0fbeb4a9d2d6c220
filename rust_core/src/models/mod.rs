// Shared models for Hoopwatch
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Game State
// ============================================================================

/// Where a game is in its lifecycle.
///
/// On the wire this is the backend's integer code (1 = upcoming, 2 = live,
/// 3 = final). Lower-case names are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGameState", into = "u8")]
pub enum GameState {
    Upcoming,
    Live,
    Final,
}

impl GameState {
    pub fn code(&self) -> u8 {
        match self {
            GameState::Upcoming => 1,
            GameState::Live => 2,
            GameState::Final => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(GameState::Upcoming),
            2 => Some(GameState::Live),
            3 => Some(GameState::Final),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameState::Upcoming => "upcoming",
            GameState::Live => "live",
            GameState::Final => "final",
        }
    }

    /// Scores are meaningless before tip-off
    pub fn has_started(&self) -> bool {
        !matches!(self, GameState::Upcoming)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<GameState> for u8 {
    fn from(state: GameState) -> Self {
        state.code()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGameState {
    Code(u8),
    Name(String),
}

impl TryFrom<RawGameState> for GameState {
    type Error = String;

    fn try_from(raw: RawGameState) -> Result<Self, Self::Error> {
        match raw {
            RawGameState::Code(code) => {
                GameState::from_code(code).ok_or_else(|| format!("unknown game state code {code}"))
            }
            RawGameState::Name(name) => match name.to_ascii_lowercase().as_str() {
                "upcoming" | "scheduled" => Ok(GameState::Upcoming),
                "live" | "in_progress" => Ok(GameState::Live),
                "final" => Ok(GameState::Final),
                other => Err(format!("unknown game state '{other}'")),
            },
        }
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// One side of a game as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSnapshot {
    pub name: String,
    pub abbreviation: String,
    pub score: u32,
    /// Percentage in [0, 100]; only ever set client-side
    #[serde(default, alias = "winProb")]
    pub win_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TeamSnapshot {
    pub fn new(name: impl Into<String>, abbreviation: impl Into<String>, score: u32) -> Self {
        Self {
            name: name.into(),
            abbreviation: abbreviation.into(),
            score,
            win_probability: None,
            color: None,
        }
    }
}

/// Point-in-time description of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub id: String,
    pub home_team: TeamSnapshot,
    pub visitor_team: TeamSnapshot,
    #[serde(default, alias = "gameStatusText")]
    pub status_text: String,
    #[serde(alias = "gameState")]
    pub state: GameState,
    #[serde(default, alias = "lastPlay")]
    pub last_play_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_left: Option<String>,
}

impl GameSnapshot {
    /// Both sides carry a computed probability
    pub fn has_win_probabilities(&self) -> bool {
        self.home_team.win_probability.is_some() && self.visitor_team.win_probability.is_some()
    }

    /// Team the model favours and its probability. Ties go to the home team.
    pub fn predicted_winner(&self) -> Option<(&TeamSnapshot, f64)> {
        let home = self.home_team.win_probability?;
        let visitor = self.visitor_team.win_probability?;
        if visitor > home {
            Some((&self.visitor_team, visitor))
        } else {
            Some((&self.home_team, home))
        }
    }

    /// Live game whose status text is a running clock ("Q3 5:32")
    pub fn is_clock_running(&self) -> bool {
        self.state == GameState::Live && self.status_text.contains(':')
    }

    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.visitor_team.name, self.home_team.name)
    }
}

// ============================================================================
// Game Collection
// ============================================================================

/// Ordered set of games, unique by id, in backend order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GameCollection {
    games: Vec<GameSnapshot>,
}

impl GameCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from backend order, keeping the first snapshot seen for each id.
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = GameSnapshot>) -> Self {
        let mut seen = FxHashSet::default();
        let mut games = Vec::new();
        for game in snapshots {
            if seen.insert(game.id.clone()) {
                games.push(game);
            } else {
                tracing::debug!("Dropping duplicate snapshot for game {}", game.id);
            }
        }
        Self { games }
    }

    pub fn get(&self, id: &str) -> Option<&GameSnapshot> {
        self.games.iter().find(|g| g.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut GameSnapshot> {
        self.games.iter_mut().find(|g| g.id == id)
    }

    /// Zero-based position lookup, as shown in the view
    pub fn nth(&self, index: usize) -> Option<&GameSnapshot> {
        self.games.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GameSnapshot> {
        self.games.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.games.iter().map(|g| g.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn into_vec(self) -> Vec<GameSnapshot> {
        self.games
    }
}

impl<'a> IntoIterator for &'a GameCollection {
    type Item = &'a GameSnapshot;
    type IntoIter = std::slice::Iter<'a, GameSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.games.iter()
    }
}

impl FromIterator<GameSnapshot> for GameCollection {
    fn from_iter<I: IntoIterator<Item = GameSnapshot>>(iter: I) -> Self {
        Self::from_snapshots(iter)
    }
}

// ============================================================================
// Prediction
// ============================================================================

/// Lifecycle of an on-demand prediction for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Unrequested,
    Requested,
    Computed,
}

/// Body of `POST /run-calculations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRequest {
    pub game_id: String,
}

/// Response of `POST /run-calculations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    #[serde(default)]
    pub game_id: Option<String>,
    /// Fraction in [0, 1]
    #[serde(alias = "home_win_prob")]
    pub home_win_probability: f64,
}
