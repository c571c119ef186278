use anyhow::{Context, Result};
use uuid::Uuid;

use nous_srs::flashcards::{format_interval, CardState};

use crate::app::App;
use crate::render::terminal::{paint, status_color, Color};
use crate::OutputFormat;

pub fn run_review(app: &App, card_id: Uuid, rating: u8, format: &OutputFormat, use_color: bool) -> Result<()> {
    let now = app.now();
    let summary = app
        .service
        .review_card(app.owner_id, card_id, rating, now)
        .context("Failed to review card")?;

    match format {
        // The full summary carries the snapshot `undo` needs
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Plain => {
            let days = (summary.next_due - now).num_milliseconds() as f64 / 86_400_000.0;
            println!(
                "Card {} is now {}, next review in {} ({})",
                summary.card_id,
                paint(summary.status.as_str(), status_color(summary.status), use_color),
                format_interval(days),
                summary.next_due.format("%Y-%m-%d %H:%M")
            );
            println!("  Log ID: {}", summary.log_id);
            println!(
                "  {}",
                paint("Use --format json to keep the snapshot for undo", Color::DIM, use_color)
            );
        }
    }
    Ok(())
}

pub fn run_undo(app: &App, card_id: Uuid, log_id: Uuid, snapshot: &str, format: &OutputFormat) -> Result<()> {
    let snapshot = read_snapshot(snapshot)?;
    app.service
        .undo_review(app.owner_id, card_id, &snapshot, log_id)
        .context("Failed to undo review")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "cardId": card_id.to_string(),
                "logId": log_id.to_string(),
                "undone": true,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("Undid review {} of card {}", log_id, card_id),
    }
    Ok(())
}

/// Accepts a bare CardState or the whole review summary
fn read_snapshot(source: &str) -> Result<CardState> {
    let value: serde_json::Value = App::read_json(source)?;
    let snapshot = match value.get("previous") {
        Some(previous) => previous.clone(),
        None => value,
    };
    serde_json::from_value(snapshot).context("Snapshot is not a card state")
}

pub fn run_suspend(app: &App, card_id: Uuid, suspended: bool, format: &OutputFormat) -> Result<()> {
    let card = app
        .service
        .suspend_card(app.owner_id, card_id, suspended)
        .context("Failed to update card")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&card)?),
        OutputFormat::Plain => {
            let state = if card.suspended { "suspended" } else { "active" };
            println!("Card {} is {}", card.id, state);
        }
    }
    Ok(())
}
