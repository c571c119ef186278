use anyhow::{Context, Result};
use uuid::Uuid;

use nous_srs::flashcards::ContentUnit;

use crate::app::App;
use crate::OutputFormat;

pub fn run_sync(app: &App, document_id: Uuid, units: Option<&str>, format: &OutputFormat) -> Result<()> {
    if let Some(source) = units {
        let mut units: Vec<ContentUnit> = App::read_json(source)?;
        for unit in &mut units {
            unit.document_id = document_id;
        }
        app.store
            .put_content_units(document_id, &units)
            .context("Failed to store content units")?;
    }

    let report = app
        .service
        .sync_document_cards(app.owner_id, document_id, app.now())
        .context("Failed to sync document cards")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => println!(
            "Document {}: {} cards created, {} removed",
            document_id, report.created, report.removed
        ),
    }
    Ok(())
}

pub fn run_cleanup(app: &App, format: &OutputFormat) -> Result<()> {
    let removed = app
        .service
        .cleanup_orphans(app.owner_id)
        .context("Failed to clean up cards")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "removed": removed });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("Removed {} orphaned cards from {}", removed, app.data_dir.display()),
    }
    Ok(())
}
