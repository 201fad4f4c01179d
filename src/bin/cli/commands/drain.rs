use anyhow::{bail, Result};

use crate::app::App;
use crate::render::terminal::outcome_label;
use crate::OutputFormat;

pub async fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    if !app.probe_once().await {
        log::warn!("Server {} is unreachable", app.client.base_url());
    }

    let Some(report) = app.engine.drain_once().await else {
        bail!("A drain pass is already running");
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "report": report,
                    "pending": app.queue.len(),
                }))?
            );
        }
        OutputFormat::Plain => {
            println!(
                "Delivered {}, discarded {}, {} pending ({})",
                report.submitted,
                report.discarded,
                app.queue.len(),
                outcome_label(report.outcome, use_color)
            );
        }
    }

    Ok(())
}
