use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::{paint, rule, Color};
use crate::OutputFormat;

pub fn run(app: &App, stats_only: bool, format: &OutputFormat, use_color: bool) -> Result<()> {
    let now = app.now();

    if stats_only {
        let stats = app
            .service
            .get_leech_stats(app.owner_id, now)
            .context("Failed to compute leech stats")?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
            OutputFormat::Plain => {
                println!("Leeches:      {}", stats.total_leeches);
                println!("  suspended:  {}", stats.suspended_leeches);
                println!("  by lapses:  {}", stats.by_lapses);
                println!("  by recall:  {}", stats.by_retention);
            }
        }
        return Ok(());
    }

    let leeches = app
        .service
        .list_leech_cards(app.owner_id, now)
        .context("Failed to list leech cards")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&leeches)?),
        OutputFormat::Plain => {
            if leeches.is_empty() {
                println!("No leeches.");
                return Ok(());
            }

            let widths = [36, 6, 6, 9, 40];
            println!(
                "{:<w0$} {:>w1$} {:>w2$} {:<w3$} {}",
                "Card", "Lapses", "Reps", "State", "Reason",
                w0 = widths[0], w1 = widths[1], w2 = widths[2], w3 = widths[3]
            );
            println!("{}", rule(&widths));

            for leech in &leeches {
                let state = if leech.card.suspended { "suspended" } else { "active" };
                println!(
                    "{:<w0$} {:>w1$} {:>w2$} {:<w3$} {}",
                    leech.card.id,
                    leech.card.memory.lapses,
                    leech.card.memory.reps,
                    state,
                    paint(&leech.reason, Color::RED, use_color),
                    w0 = widths[0], w1 = widths[1], w2 = widths[2], w3 = widths[3]
                );
            }

            println!("\n{} leeches", leeches.len());
        }
    }
    Ok(())
}
