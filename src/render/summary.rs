use crate::render::transcript::LIFELOG_SEPARATOR;
use crate::render::RenderError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Produces the summary artifact from a day's raw transcript
///
/// The default [`OutlineSummarizer`] is deterministic and local; a
/// model-backed implementation can be plugged into the engine instead.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, date: NaiveDate, transcript: &str) -> Result<String, RenderError>;
}

/// Builds a journal outline from the transcript's headings and speakers
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineSummarizer;

#[derive(Debug, Default)]
struct Outline {
    conversations: usize,
    words: usize,
    sections: Vec<(usize, String)>,
    speakers: BTreeMap<String, usize>,
}

/// `- Ana (1/6/25 9:00 AM): text` or `> Ana: text` → `Ana`
fn speaker_of(line: &str) -> Option<String> {
    let rest = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("> "))?;
    let (head, _) = rest.split_once(':')?;
    let name = match head.split_once(" (") {
        Some((name, _)) => name,
        None => head,
    }
    .trim();

    if name.is_empty() || name.len() > 60 || name.contains('#') || name.contains('*') {
        return None;
    }
    Some(name.to_string())
}

impl Outline {
    fn parse(transcript: &str) -> Self {
        let mut outline = Outline {
            conversations: transcript
                .split(LIFELOG_SEPARATOR)
                .filter(|part| !part.trim().is_empty())
                .count(),
            ..Outline::default()
        };

        for line in transcript.lines() {
            let line = line.trim();
            outline.words += line.split_whitespace().count();

            if let Some(title) = line.strip_prefix("# ") {
                outline.sections.push((0, title.trim().to_string()));
            } else if let Some(title) = line.strip_prefix("## ") {
                outline.sections.push((1, title.trim().to_string()));
            } else if let Some(speaker) = speaker_of(line) {
                *outline.speakers.entry(speaker).or_default() += 1;
            }
        }

        outline
    }
}

#[async_trait]
impl Summarizer for OutlineSummarizer {
    async fn summarize(&self, date: NaiveDate, transcript: &str) -> Result<String, RenderError> {
        if transcript.trim().is_empty() {
            return Err(RenderError::Summarizer(
                "transcript has no content to summarize".to_string(),
            ));
        }

        let outline = Outline::parse(transcript);
        let mut out = format!("# Journal for {}\n\n", date.format("%Y-%m-%d"));

        out.push_str(&format!(
            "{} conversation(s), about {} words.\n",
            outline.conversations, outline.words
        ));

        if !outline.sections.is_empty() {
            out.push_str("\n## Topics\n\n");
            for (depth, title) in &outline.sections {
                out.push_str(&"  ".repeat(*depth));
                out.push_str("- ");
                out.push_str(title);
                out.push('\n');
            }
        }

        if !outline.speakers.is_empty() {
            let mut speakers: Vec<(&String, &usize)> = outline.speakers.iter().collect();
            speakers.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

            out.push_str("\n## People\n\n");
            for (name, lines) in speakers {
                out.push_str(&format!("- {} ({} line(s))\n", name, lines));
            }
        }

        Ok(out)
    }
}
