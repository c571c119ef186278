use anyhow::{Context, Result};
use uuid::Uuid;

use nous_srs::flashcards::Rating;

use crate::app::App;
use crate::render::terminal::{paint, paint_cell, status_color, Color};
use crate::OutputFormat;

pub fn run(app: &App, card_id: Uuid, format: &OutputFormat, use_color: bool) -> Result<()> {
    let preview = app
        .service
        .preview_card(app.owner_id, card_id, app.now())
        .context("Failed to preview card")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&preview)?),
        OutputFormat::Plain => {
            println!(
                "Card {} ({}), recall probability {:.0}%",
                preview.card_id,
                paint(preview.status.as_str(), status_color(preview.status), use_color),
                preview.retrievability * 100.0
            );
            let colors = [Color::RED, Color::YELLOW, Color::GREEN, Color::CYAN];
            for ((rating, label), color) in Rating::ALL.iter().zip(preview.labels.iter()).zip(colors) {
                let name = format!("{} {:?}", rating.value(), rating);
                println!("  {} {}", paint_cell(&name, 8, color, use_color), label);
            }
        }
    }
    Ok(())
}
