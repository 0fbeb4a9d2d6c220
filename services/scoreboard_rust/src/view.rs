//! Plain-text rendering of the board.

use chrono::{Duration, NaiveDate};
use hoopwatch_core::models::{GameSnapshot, GameState, PredictionStatus};
use hoopwatch_core::BoardSnapshot;
use std::fmt::Write;

pub const TITLE: &str = "NBA XGBoost Model";
pub const LOADING_MESSAGE: &str = "Loading NBA scores...";
pub const EMPTY_MESSAGE: &str = "No games scheduled for this date.";
pub const HELP_LINE: &str =
    "[n]ext [p]rev [t]oday  date YYYY-MM-DD  predict N  [r]efresh  [q]uit";

/// Days shown either side of the selected date
const STRIP_RADIUS: i64 = 3;

pub fn render_board(board: &BoardSnapshot) -> String {
    if board.loading {
        return format!("{LOADING_MESSAGE}\n");
    }
    if let Some(error) = &board.error {
        return format!("Error: {error}\nCheck the scores server console for details.\n");
    }

    let mut out = String::new();
    let _ = writeln!(out, "{TITLE}");
    let _ = writeln!(out, "{}", render_date_strip(board.date));
    let _ = writeln!(out);

    if board.games.is_empty() {
        let _ = writeln!(out, "{EMPTY_MESSAGE}");
    }
    for (i, game) in board.games.iter().enumerate() {
        out.push_str(&render_card(i + 1, game, board.prediction_status(game)));
        out.push('\n');
    }
    let _ = writeln!(out, "{HELP_LINE}");
    out
}

/// Seven days centered on `selected`, the selected one bracketed. Days
/// outside the calendar range are left out.
pub fn render_date_strip(selected: NaiveDate) -> String {
    let days: Vec<String> = (-STRIP_RADIUS..=STRIP_RADIUS)
        .filter_map(|offset| {
            let date = selected.checked_add_signed(Duration::days(offset))?;
            Some((offset, date))
        })
        .map(|(offset, date)| {
            let label = date.format("%a %b %-d").to_string();
            if offset == 0 {
                format!("[{label}]")
            } else {
                label
            }
        })
        .collect();
    format!("< {} >", days.join("  "))
}

pub fn render_card(index: usize, game: &GameSnapshot, prediction: PredictionStatus) -> String {
    let mut out = String::new();

    let label = match game.state {
        GameState::Live => "● LIVE",
        GameState::Upcoming => "UPCOMING",
        GameState::Final => "FINAL",
    };
    let clock = if game.is_clock_running() { " ⏱" } else { "" };
    let _ = writeln!(out, "{index:>2}. {label:<10} {}{clock}", game.status_text);

    let (visitor_score, home_score) = if game.state.has_started() {
        (
            game.visitor_team.score.to_string(),
            game.home_team.score.to_string(),
        )
    } else {
        (String::new(), String::new())
    };
    let _ = writeln!(
        out,
        "    {:<4}{:>4}   vs   {:<4}{:>4}",
        game.visitor_team.abbreviation, visitor_score, game.home_team.abbreviation, home_score
    );

    if !game.last_play_description.is_empty() {
        let _ = writeln!(out, "    {}", game.last_play_description);
    }

    match (prediction, game.predicted_winner()) {
        (_, Some((team, pct))) => {
            let _ = writeln!(out, "    Pregame predicted winner: {} ({}%)", team.name, pct);
        }
        (PredictionStatus::Requested, None) => {
            let _ = writeln!(out, "    predicting…");
        }
        _ => {
            let _ = writeln!(out, "    [predict {index}]");
        }
    }

    let _ = writeln!(out, "    {}", game.matchup());
    out
}
