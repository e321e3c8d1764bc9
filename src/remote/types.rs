//! Wire types for the remote lifelog service
//!
//! Only the fields the archive needs are typed. Content nodes keep every
//! other field they arrive with so the structured-content artifact is a
//! faithful copy of what the service returned.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Summary the service gives its generated daily-insight chats
pub const DAILY_INSIGHTS_SUMMARY: &str = "Daily insights";

/// One recorded conversation or session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifelog {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub markdown: Option<String>,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub end_time: Option<String>,

    #[serde(default)]
    pub contents: Vec<ContentNode>,
}

/// A structured element of a lifelog (heading, blockquote, utterance...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    #[serde(rename = "type", default)]
    pub node_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentNode {
    /// Returns true for heading1..heading3 nodes
    pub fn is_heading(&self) -> bool {
        matches!(
            self.node_type.as_deref(),
            Some("heading1") | Some("heading2") | Some("heading3")
        )
    }
}

/// A chat thread; daily insights are delivered as chats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl Chat {
    /// Returns true if this chat is one of the service's daily-insight chats
    pub fn is_daily_insight(&self) -> bool {
        self.summary.as_deref() == Some(DAILY_INSIGHTS_SUMMARY)
    }

    /// Creation time, if present and parseable
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        self.created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    /// Text of the first assistant message
    pub fn assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role() == Some("assistant"))
            .and_then(|m| m.text.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub user: Option<ChatUser>,
}

impl ChatMessage {
    pub fn role(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.role.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// One item returned by the remote service
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Lifelog(Lifelog),
    Chat(Chat),
}

impl Record {
    pub fn as_lifelog(&self) -> Option<&Lifelog> {
        match self {
            Record::Lifelog(lifelog) => Some(lifelog),
            Record::Chat(_) => None,
        }
    }

    pub fn as_chat(&self) -> Option<&Chat> {
        match self {
            Record::Chat(chat) => Some(chat),
            Record::Lifelog(_) => None,
        }
    }
}

/// One page of a cursor-paginated listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchPage {
    pub items: Vec<Record>,
    pub next_cursor: Option<String>,
}

/// `{"data": {"lifelogs": [...]}, "meta": {"lifelogs": {"nextCursor": ...}}}`
#[derive(Debug, Deserialize)]
pub struct LifelogsResponse {
    #[serde(default)]
    pub data: LifelogsData,
    #[serde(default)]
    pub meta: LifelogsMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct LifelogsData {
    #[serde(default)]
    pub lifelogs: Vec<Lifelog>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LifelogsMeta {
    #[serde(default)]
    pub lifelogs: CursorMeta,
}

/// `{"data": {"chats": [...]}, "meta": {"chats": {"nextCursor": ...}}}`
#[derive(Debug, Deserialize)]
pub struct ChatsResponse {
    #[serde(default)]
    pub data: ChatsData,
    #[serde(default)]
    pub meta: ChatsMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatsData {
    #[serde(default)]
    pub chats: Vec<Chat>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatsMeta {
    #[serde(default)]
    pub chats: CursorMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMeta {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl From<LifelogsResponse> for FetchPage {
    fn from(response: LifelogsResponse) -> Self {
        FetchPage {
            items: response
                .data
                .lifelogs
                .into_iter()
                .map(Record::Lifelog)
                .collect(),
            next_cursor: response.meta.lifelogs.next_cursor.filter(|c| !c.is_empty()),
        }
    }
}

impl From<ChatsResponse> for FetchPage {
    fn from(response: ChatsResponse) -> Self {
        FetchPage {
            items: response.data.chats.into_iter().map(Record::Chat).collect(),
            next_cursor: response.meta.chats.next_cursor.filter(|c| !c.is_empty()),
        }
    }
}
