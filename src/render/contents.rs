use crate::remote::{ContentNode, Lifelog};
use crate::render::RenderError;
use crate::state::ArtifactKind;
use serde::{Deserialize, Serialize};

/// One lifelog as stored in the structured-content artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub lifelog_id: String,

    #[serde(default)]
    pub full_markdown: Option<String>,

    #[serde(default)]
    pub contents: Vec<ContentNode>,
}

impl From<&Lifelog> for ContentEntry {
    fn from(lifelog: &Lifelog) -> Self {
        Self {
            lifelog_id: lifelog.id.clone(),
            full_markdown: lifelog.markdown.clone(),
            contents: lifelog.contents.clone(),
        }
    }
}

/// Renders lifelogs as a pretty-printed JSON array of [`ContentEntry`]
///
/// Returns None when there are no lifelogs.
pub fn render_contents<'a>(
    lifelogs: impl IntoIterator<Item = &'a Lifelog>,
) -> Result<Option<String>, RenderError> {
    let entries: Vec<ContentEntry> = lifelogs.into_iter().map(ContentEntry::from).collect();
    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string_pretty(&entries)?))
}

/// Parses a structured-content artifact back into entries
pub fn parse_contents(text: &str) -> Result<Vec<ContentEntry>, RenderError> {
    serde_json::from_str(text).map_err(|e| RenderError::Malformed {
        kind: ArtifactKind::StructuredContent,
        reason: e.to_string(),
    })
}
