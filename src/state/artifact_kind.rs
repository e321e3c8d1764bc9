use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The categories of per-day output produced by a sync
///
/// Variants are declared in dependency order, so the derived `Ord` is a valid
/// topological order of the graph: every kind sorts after its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// Markdown transcript of every lifelog recorded that day
    RawTranscript,

    /// JSON array of the structured content nodes of each lifelog
    StructuredContent,

    /// Journal-style summary derived from the raw transcript
    Summary,

    /// The "Daily insights" chat the remote service generates
    Insight,

    /// Usage analytics derived from the structured content
    Analytics,
}

impl ArtifactKind {
    /// Every kind, in dependency order
    pub const ALL: [ArtifactKind; 5] = [
        Self::RawTranscript,
        Self::StructuredContent,
        Self::Summary,
        Self::Insight,
        Self::Analytics,
    ];

    /// The kind that must be complete for a date before this kind can be produced
    pub fn upstream(&self) -> Option<ArtifactKind> {
        match self {
            Self::RawTranscript | Self::Insight => None,
            Self::StructuredContent | Self::Summary => Some(Self::RawTranscript),
            Self::Analytics => Some(Self::StructuredContent),
        }
    }

    /// Returns true if this kind is fetched from the remote API rather than derived locally
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::RawTranscript | Self::StructuredContent | Self::Insight
        )
    }

    /// Directory under the archive root holding this kind's files
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::RawTranscript => "lifelogs",
            Self::StructuredContent => "contents",
            Self::Summary => "summaries",
            Self::Insight => "insights",
            Self::Analytics => "analytics",
        }
    }

    /// Suffix appended to the ISO date to form the file name
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Self::RawTranscript => "-lifelogs.md",
            Self::StructuredContent => "-contents.json",
            Self::Summary => "-summary.md",
            Self::Insight => "-daily-insights.md",
            Self::Analytics => "-analytics.md",
        }
    }

    /// Canonical file name for `date`, e.g. `2025-01-06-lifelogs.md`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}{}", date.format("%Y-%m-%d"), self.file_suffix())
    }

    /// Parses the date back out of a canonical file name
    ///
    /// Returns None for anything that is not exactly `YYYY-MM-DD<suffix>`.
    pub fn parse_file_name(&self, name: &str) -> Option<NaiveDate> {
        let stem = name.strip_suffix(self.file_suffix())?;
        if stem.len() != 10 {
            return None;
        }
        NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
    }

    /// Converts the kind to its database / config string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::RawTranscript => "raw-transcript",
            Self::StructuredContent => "structured-content",
            Self::Summary => "summary",
            Self::Insight => "insight",
            Self::Analytics => "analytics",
        }
    }

    /// Parses a kind from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.to_db_string() == s)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_string(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|k| k.to_db_string()).collect();
            format!("unknown artifact kind '{}' (expected one of: {})", s, known.join(", "))
        })
    }
}
