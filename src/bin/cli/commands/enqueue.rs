use anyhow::{bail, Context, Result};
use serde::Deserialize;

use inksync_lib::storage::Stroke;

use crate::app::App;
use crate::OutputFormat;

/// Accept either a bare array or the same `{ "strokes": [...] }` body the
/// server's append endpoint takes.
#[derive(Deserialize)]
#[serde(untagged)]
enum StrokeFile {
    Bare(Vec<Stroke>),
    Wrapped { strokes: Vec<Stroke> },
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
            .context("Failed to read strokes from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))
    }
}

pub fn run(app: &App, page: &str, file: &str, format: &OutputFormat) -> Result<()> {
    let content = read_input(file)?;
    let strokes = match serde_json::from_str::<StrokeFile>(&content)
        .context("Expected a JSON array of strokes or {\"strokes\": [...]}")?
    {
        StrokeFile::Bare(strokes) | StrokeFile::Wrapped { strokes } => strokes,
    };

    for stroke in &strokes {
        if let Err(problem) = stroke.validate() {
            bail!("Refusing to queue invalid stroke: {}", problem);
        }
    }

    let entry = app
        .queue
        .enqueue(page, strokes)
        .context("Failed to queue strokes")?;

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "id": entry.id,
                    "pageId": entry.page_id,
                    "strokes": entry.strokes.len(),
                    "pending": app.queue.len(),
                }))?
            );
        }
        OutputFormat::Plain => {
            println!(
                "Queued batch {} ({} stroke(s)) for page {}; {} batch(es) pending",
                entry.id,
                entry.strokes.len(),
                entry.page_id,
                app.queue.len()
            );
        }
    }

    Ok(())
}
