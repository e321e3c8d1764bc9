//! Artifact renderers
//!
//! Remote kinds are rendered from the records the fetcher returned; local
//! kinds are rendered from their upstream artifact's text.
//!
//! | Kind | Input | Renderer |
//! |------|-------|----------|
//! | raw-transcript | lifelogs | `transcript` |
//! | structured-content | lifelogs | `contents` |
//! | insight | daily-insight chats | `insight` |
//! | summary | raw-transcript artifact | `Summarizer` |
//! | analytics | structured-content artifact | `analytics` |
//!
//! The monthly rollup (`monthly`) aggregates a month of structured-content
//! artifacts and is not a per-date kind.

mod analytics;
mod contents;
mod insight;
mod monthly;
mod summary;
mod transcript;

pub use analytics::{compute_stats, extract_sessions, render_analytics, Session, UsageStats};
pub use contents::{parse_contents, render_contents, ContentEntry};
pub use insight::render_insight;
pub use monthly::{days_in_month, month_start, render_monthly, DayTotals, MonthlyReport};
pub use summary::{OutlineSummarizer, Summarizer};
pub use transcript::{render_transcript, LIFELOG_SEPARATOR};

use crate::remote::Record;
use crate::state::ArtifactKind;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while rendering an artifact
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Malformed {kind} input: {reason}")]
    Malformed { kind: ArtifactKind, reason: String },

    #[error("Summarizer failed: {0}")]
    Summarizer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} cannot be rendered from {source_desc}")]
    Unsupported {
        kind: ArtifactKind,
        source_desc: &'static str,
    },
}

/// Turns fetched records or upstream artifacts into artifact content
#[derive(Clone)]
pub struct Renderer {
    summarizer: Arc<dyn Summarizer>,
    timezone: Tz,
}

impl Renderer {
    pub fn new(summarizer: Arc<dyn Summarizer>, timezone: Tz) -> Self {
        Self {
            summarizer,
            timezone,
        }
    }

    /// Renders a remote kind; None means the records hold nothing worth writing
    pub fn render_remote(
        &self,
        kind: ArtifactKind,
        date: NaiveDate,
        records: &[Record],
    ) -> Result<Option<String>, RenderError> {
        match kind {
            ArtifactKind::RawTranscript => Ok(render_transcript(
                records.iter().filter_map(Record::as_lifelog),
            )),
            ArtifactKind::StructuredContent => {
                render_contents(records.iter().filter_map(Record::as_lifelog))
            }
            ArtifactKind::Insight => Ok(render_insight(
                date,
                records.iter().filter_map(Record::as_chat),
            )),
            ArtifactKind::Summary | ArtifactKind::Analytics => Err(RenderError::Unsupported {
                kind,
                source_desc: "remote records",
            }),
        }
    }

    /// Renders a local kind from its upstream artifact's content
    pub async fn render_local(
        &self,
        kind: ArtifactKind,
        date: NaiveDate,
        upstream: &str,
    ) -> Result<String, RenderError> {
        match kind {
            ArtifactKind::Summary => self.summarizer.summarize(date, upstream).await,
            ArtifactKind::Analytics => {
                let entries = parse_contents(upstream)?;
                Ok(render_analytics(date, &entries, self.timezone))
            }
            ArtifactKind::RawTranscript
            | ArtifactKind::StructuredContent
            | ArtifactKind::Insight => Err(RenderError::Unsupported {
                kind,
                source_desc: "an upstream artifact",
            }),
        }
    }
}
