use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest id accepted for notebooks, pages and strokes.
pub const MAX_ID_LEN: usize = 128;

/// Ids become directory names, so only a conservative character set is allowed.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    pub pressure: f32,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64, pressure: f32) -> Self {
        Self { x, y, pressure }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stroke {
    pub id: String,
    pub points: Vec<StrokePoint>,
    pub color: String,
    pub width: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pen_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Stroke {
    /// Build a stroke with a fresh client-side id.
    pub fn new(points: Vec<StrokePoint>, color: impl Into<String>, width: f32) -> Self {
        Self {
            id: new_id("st"),
            points,
            color: color.into(),
            width,
            pen_style: None,
            tool: None,
            created_at: Utc::now(),
        }
    }

    /// Returns a description of the first problem found, if any.
    pub fn validate(&self) -> Result<(), String> {
        if !is_valid_id(&self.id) {
            return Err(format!("invalid stroke id '{}'", self.id));
        }
        if self.points.len() < 2 {
            return Err(format!(
                "stroke {} has {} point(s), at least 2 required",
                self.id,
                self.points.len()
            ));
        }
        if let Some(p) = self
            .points
            .iter()
            .find(|p| !(0.0..=1.0).contains(&p.pressure))
        {
            return Err(format!(
                "stroke {} has pressure {} outside [0, 1]",
                self.id, p.pressure
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionStatus {
    Pending,
    Done,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcription {
    pub status: TranscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotebookMeta {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

impl NotebookMeta {
    pub fn new(title: String, settings: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("nb"),
            title,
            created_at: now,
            updated_at: now,
            settings,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub id: String,
    pub notebook_id: String,
    pub page_number: u32,
    pub canvas_x: f64,
    pub canvas_y: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<Transcription>,
}

impl PageMeta {
    pub fn new(notebook_id: String, page_number: u32, canvas_x: f64, canvas_y: f64) -> Self {
        let now = Utc::now();
        Self {
            id: new_id("pg"),
            notebook_id,
            page_number,
            canvas_x,
            canvas_y,
            created_at: now,
            updated_at: now,
            links: None,
            tags: None,
            transcription: None,
        }
    }
}

/// Partial page update. Absent fields are left alone; present fields win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageUpdate {
    #[serde(default)]
    pub canvas_x: Option<f64>,
    #[serde(default)]
    pub canvas_y: Option<f64>,
    #[serde(default)]
    pub links: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub transcription: Option<Transcription>,
}

impl PageUpdate {
    pub fn apply(self, page: &mut PageMeta) {
        if let Some(x) = self.canvas_x {
            page.canvas_x = x;
        }
        if let Some(y) = self.canvas_y {
            page.canvas_y = y;
        }
        if self.links.is_some() {
            page.links = self.links;
        }
        if self.tags.is_some() {
            page.tags = self.tags;
        }
        if self.transcription.is_some() {
            page.transcription = self.transcription;
        }
        page.updated_at = Utc::now();
    }
}
