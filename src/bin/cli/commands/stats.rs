use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let stats = app
        .service
        .get_review_stats(app.owner_id, app.now())
        .context("Failed to compute review stats")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Plain => {
            println!("{}", paint("Cards", Color::BOLD, use_color));
            println!("  Total:      {}", stats.total_cards);
            println!("  New:        {}", stats.new_cards);
            println!("  Learning:   {}", stats.learning_cards);
            println!("  Review:     {}", stats.review_cards);
            println!("  Suspended:  {}", stats.suspended_cards);
            println!("  Due now:    {}", paint(&stats.due_cards.to_string(), Color::YELLOW, use_color));
            println!();
            println!("{}", paint("Today", Color::BOLD, use_color));
            println!("  Reviews:    {}", stats.reviews_today);
            println!("  Correct:    {}", stats.correct_today);
            let streak = format!("{} day{}", stats.streak_days, if stats.streak_days == 1 { "" } else { "s" });
            println!("  Streak:     {}", paint(&streak, Color::GREEN, use_color));
        }
    }
    Ok(())
}
