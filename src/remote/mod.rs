//! Remote service access
//!
//! - `traits`: the `RemoteApi` seam and `FetchError`
//! - `types`: wire types (lifelogs, chats, pages)
//! - `client`: the reqwest-backed `HttpRemoteApi`
//! - `fetcher`: `PageFetcher`, pagination + page-level retry + rate limiting

mod client;
mod fetcher;
mod traits;
mod types;

pub use client::{build_http_client, classify_status, HttpRemoteApi, API_KEY_HEADER};
pub use fetcher::PageFetcher;
pub use traits::{FetchError, RemoteApi};
pub use types::{
    Chat, ChatMessage, ChatUser, ContentNode, FetchPage, Lifelog, Record, DAILY_INSIGHTS_SUMMARY,
};
