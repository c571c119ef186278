use anyhow::{Context, Result};
use uuid::Uuid;

use nous_srs::config::SessionConfig;
use nous_srs::flashcards::{CardSide, QueueEntry, QueueScope};

use crate::app::App;
use crate::render::terminal::{bucket_label, paint, paint_cell, rule, status_color, truncate, Color};
use crate::OutputFormat;

fn scope(document: Option<Uuid>) -> QueueScope {
    match document {
        Some(document_id) => QueueScope::Document { document_id },
        None => QueueScope::Global,
    }
}

pub fn run_session(
    app: &App,
    document: Option<Uuid>,
    limits: &SessionConfig,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let now = app.now();
    let session = match document {
        Some(document_id) => app.service.get_document_session(app.owner_id, document_id, limits, now),
        None => app.service.get_learn_session(app.owner_id, limits, now),
    }
    .context("Failed to build study session")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&session)?),
        OutputFormat::Plain => {
            if !session.exam_document_ids.is_empty() {
                let label = format!("{} document(s) in an exam window", session.exam_document_ids.len());
                println!("{}\n", paint(&label, Color::MAGENTA, use_color));
            }
            print_entries(&session.entries, use_color);
        }
    }
    Ok(())
}

pub fn run_due(
    app: &App,
    document: Option<Uuid>,
    limit: Option<usize>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(app.config().session.review_limit);
    let entries = app
        .service
        .get_due_cards(app.owner_id, scope(document), limit, app.now())
        .context("Failed to list due cards")?;
    print_list(&entries, format, use_color)
}

pub fn run_new(
    app: &App,
    document: Option<Uuid>,
    limit: Option<usize>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let limit = limit.unwrap_or(app.config().session.new_limit);
    let entries = app
        .service
        .get_new_cards(app.owner_id, scope(document), limit, app.now())
        .context("Failed to list new cards")?;
    print_list(&entries, format, use_color)
}

fn print_list(entries: &[QueueEntry], format: &OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Plain => print_entries(entries, use_color),
    }
    Ok(())
}

fn print_entries(entries: &[QueueEntry], use_color: bool) {
    if entries.is_empty() {
        println!("Nothing to study.");
        return;
    }

    let widths = [36, 8, 10, 16, 6, 40];
    println!(
        "{:<w0$} {:<w1$} {:<w2$} {:<w3$} {:>w4$} {}",
        "Card", "Queue", "Status", "Due", "R", "Prompt",
        w0 = widths[0], w1 = widths[1], w2 = widths[2], w3 = widths[3], w4 = widths[4]
    );
    println!("{}", rule(&widths));

    for entry in entries {
        let prompt = match entry.card.side {
            CardSide::Forward => &entry.unit.front,
            CardSide::Reverse => &entry.unit.back,
        };
        let status = entry.card.status();
        println!(
            "{:<w0$} {:<w1$} {} {:<w3$} {:>w4$} {}",
            entry.card.id,
            bucket_label(entry.bucket),
            paint_cell(status.as_str(), widths[2], status_color(status), use_color),
            entry.card.memory.due.format("%Y-%m-%d %H:%M").to_string(),
            format!("{:.0}%", entry.retrievability * 100.0),
            truncate(prompt, widths[5]),
            w0 = widths[0], w1 = widths[1], w3 = widths[3], w4 = widths[4]
        );
    }

    println!("\n{} cards", entries.len());
}
