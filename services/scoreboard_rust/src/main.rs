//! Scoreboard Rust Service
//!
//! Terminal scoreboard for live NBA games.
//!
//! This service:
//! - Polls the scores backend for the selected date (every interval for today)
//! - Keeps client-computed win probabilities across polls
//! - Requests pregame predictions on demand
//! - Redraws the board on every state change

mod app;
mod config;
mod view;

use anyhow::Result;
use app::{parse_command, Command, ScoreboardApp};
use chrono::Local;
use config::ScoreboardConfig;
use dotenv::dotenv;
use hoopwatch_core::{ScoreboardStore, ScoresClient};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn draw(store: &ScoreboardStore) {
    let mut stdout = std::io::stdout().lock();
    // clear screen, cursor home
    let _ = write!(stdout, "\x1b[2J\x1b[H{}", view::render_board(&store.snapshot()));
    let _ = write!(stdout, "> ");
    let _ = stdout.flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Logs go to stderr so they never interleave with the board
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Scoreboard Rust Service...");

    let config = ScoreboardConfig::from_env()?;
    info!(
        "Scores backend: {} (poll every {:?})",
        config.base_url, config.poll_interval
    );

    let client = Arc::new(ScoresClient::with_config(
        config.base_url.clone(),
        config.request_timeout,
        config.circuit_breaker.clone(),
    ));
    let today = || Local::now().date_naive();
    let start_date = config.start_date.unwrap_or_else(today);
    let store = Arc::new(ScoreboardStore::new(start_date));

    let mut app = ScoreboardApp::new(client, store.clone(), config.poll_interval, today);

    let render_task = {
        let store = store.clone();
        let mut changes = store.subscribe();
        tokio::spawn(async move {
            draw(&store);
            while changes.changed().await.is_ok() {
                draw(&store);
            }
        })
    };

    app.select_date(start_date);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Ok(Some(Command::Refresh)) => draw(&store),
            Ok(Some(command)) => {
                if !app.handle(command) {
                    break;
                }
            }
            Ok(None) => draw(&store),
            Err(e) => {
                warn!("{:#}", e);
                draw(&store);
            }
        }
    }

    app.shutdown().await;
    render_task.abort();
    println!();
    Ok(())
}
