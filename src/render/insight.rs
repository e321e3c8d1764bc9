use crate::remote::Chat;
use chrono::NaiveDate;

/// Renders the first daily-insight chat that carries assistant text
///
/// Returns None if no chat has any.
pub fn render_insight<'a>(date: NaiveDate, chats: impl IntoIterator<Item = &'a Chat>) -> Option<String> {
    let (chat, text) = chats.into_iter().find_map(|chat| {
        chat.assistant_text()
            .filter(|text| !text.trim().is_empty())
            .map(|text| (chat, text))
    })?;

    Some(format!(
        "# Daily Insights for {date}\n\n\
         *Generated by Limitless AI*\n\
         *Chat ID: {id}*\n\
         *Created: {created}*\n\n\
         ---\n\n\
         {text}\n",
        date = date.format("%Y-%m-%d"),
        id = chat.id,
        created = chat.created_at.as_deref().unwrap_or("unknown"),
        text = text.trim_end(),
    ))
}
