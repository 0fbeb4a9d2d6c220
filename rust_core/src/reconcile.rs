//! Merge a freshly polled batch of snapshots into the held collection.
//!
//! The backend is authoritative for everything except win probabilities,
//! which are computed on demand and never re-sent. Once a game's home team
//! carries a probability, both sides' probabilities are carried forward on
//! every later refresh of that game id, even if the backend starts sending
//! its own values.

use crate::models::{GameCollection, GameSnapshot};
use rustc_hash::FxHashMap;

/// Produce the next collection from the previous one and a new batch.
///
/// Output order and membership follow `incoming`; ids missing from it are
/// dropped.
pub fn reconcile(previous: &GameCollection, incoming: Vec<GameSnapshot>) -> GameCollection {
    let existing: FxHashMap<&str, &GameSnapshot> =
        previous.iter().map(|g| (g.id.as_str(), g)).collect();

    incoming
        .into_iter()
        .map(|game| match existing.get(game.id.as_str()) {
            Some(old) if old.home_team.win_probability.is_some() => carry_forward(old, game),
            _ => game,
        })
        .collect()
}

fn carry_forward(old: &GameSnapshot, mut game: GameSnapshot) -> GameSnapshot {
    game.home_team.win_probability = old.home_team.win_probability;
    game.visitor_team.win_probability = old.visitor_team.win_probability;
    game
}
