use crate::remote::Lifelog;

/// Separator placed between consecutive lifelogs in a transcript
pub const LIFELOG_SEPARATOR: &str = "\n\n---\n\n";

/// Joins the markdown of every lifelog, in order
///
/// Lifelogs without markdown are left out. Returns None if nothing remains.
pub fn render_transcript<'a>(lifelogs: impl IntoIterator<Item = &'a Lifelog>) -> Option<String> {
    let parts: Vec<&str> = lifelogs
        .into_iter()
        .filter_map(|lifelog| lifelog.markdown.as_deref())
        .filter(|markdown| !markdown.trim().is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(LIFELOG_SEPARATOR))
    }
}
