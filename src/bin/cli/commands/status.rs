use anyhow::Result;
use chrono::Utc;

use crate::app::App;
use crate::render::terminal::{format_age, online_label, paint, state_label, Color};
use crate::OutputFormat;

pub async fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    app.probe_once().await;
    let status = app.engine.status();
    let pending = app.queue.peek_all_pending();

    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = pending
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "id": e.id,
                        "pageId": e.page_id,
                        "strokes": e.strokes.len(),
                        "createdAt": e.created_at,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "server": app.client.base_url(),
                    "status": status,
                    "entries": entries,
                }))?
            );
        }
        OutputFormat::Plain => {
            println!(
                "{} {} ({})",
                paint("Server:", Color::BOLD, use_color),
                app.client.base_url(),
                online_label(status.online, use_color)
            );
            println!(
                "{} {}",
                paint("State:", Color::BOLD, use_color),
                state_label(status.state, use_color)
            );

            if pending.is_empty() {
                println!("Nothing pending");
                return Ok(());
            }

            println!("{} batch(es) pending:", pending.len());
            let now = Utc::now();
            for entry in &pending {
                println!(
                    "  #{:<6} {:<40} {:>4} stroke(s)  {}",
                    entry.id,
                    entry.page_id,
                    entry.strokes.len(),
                    paint(&format_age(entry.created_at, now), Color::DIM, use_color)
                );
            }
        }
    }

    Ok(())
}
