use std::time::Duration;

use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, max_age_hours: Option<u64>, format: &OutputFormat) -> Result<()> {
    let hours = max_age_hours.unwrap_or(app.config.client.stale_max_age_hours);
    let removed = app
        .queue
        .purge_stale_entries(Duration::from_secs(hours * 60 * 60))
        .context("Failed to purge queue")?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "removed": removed,
                    "pending": app.queue.len(),
                }))?
            );
        }
        OutputFormat::Plain => {
            println!(
                "Removed {} batch(es) older than {}h; {} pending",
                removed,
                hours,
                app.queue.len()
            );
        }
    }

    Ok(())
}
