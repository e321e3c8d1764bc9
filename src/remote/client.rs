//! HTTP implementation of the remote API
//!
//! This module handles:
//! - Building the HTTP client with user agent and timeouts
//! - Translating a (kind, date, cursor) request into the service's query parameters
//! - Classifying responses into success, transient and fatal failures

use crate::config::ApiConfig;
use crate::remote::traits::{FetchError, RemoteApi};
use crate::remote::types::{ChatsResponse, FetchPage, LifelogsResponse};
use crate::state::ArtifactKind;
use crate::SyncError;
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API section of the configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a non-success status to the failure class it belongs to
///
/// | Status | Class |
/// |--------|-------|
/// | 2xx | success (`None`) |
/// | 429 | Transient |
/// | 5xx | Transient |
/// | 401, 403, other 4xx | Fatal |
/// | anything else | Transient |
pub fn classify_status(status: StatusCode, body: &str) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }

    let snippet: String = body.chars().take(200).collect();
    let message = if snippet.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, snippet)
    };

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Some(FetchError::Transient(message));
    }

    if status.is_client_error() {
        return Some(FetchError::Fatal {
            status: Some(status.as_u16()),
            message,
        });
    }

    Some(FetchError::Transient(message))
}

/// Remote API backed by the service's REST endpoints
pub struct HttpRemoteApi {
    client: Client,
    base_url: String,
    api_key: String,
    timezone: Tz,
    page_limit: u32,
    insight_page_limit: u32,
}

impl HttpRemoteApi {
    /// Creates an API client with an explicit key
    pub fn new(config: &ApiConfig, api_key: String, timezone: Tz) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timezone,
            page_limit: config.page_limit,
            insight_page_limit: config.insight_page_limit,
        })
    }

    /// Creates an API client reading the key from the configured environment variable
    pub fn from_env(config: &ApiConfig, timezone: Tz) -> crate::Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| SyncError::MissingCredential {
                var: config.api_key_env.clone(),
            })?;
        Ok(Self::new(config, api_key, timezone)?)
    }

    fn lifelogs_request(&self, date: NaiveDate, cursor: Option<&str>) -> RequestBuilder {
        let mut params: Vec<(&str, String)> = vec![
            ("date", date.format("%Y-%m-%d").to_string()),
            ("timezone", self.timezone.name().to_string()),
            ("limit", self.page_limit.to_string()),
            ("direction", "asc".to_string()),
            ("includeMarkdown", "true".to_string()),
            ("includeHeadings", "true".to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }

        self.client
            .get(format!("{}/v1/lifelogs", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&params)
    }

    fn chats_request(&self, cursor: Option<&str>) -> RequestBuilder {
        let mut params: Vec<(&str, String)> = vec![
            ("limit", self.insight_page_limit.to_string()),
            ("direction", "desc".to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }

        self.client
            .get(format!("{}/v1/chats", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&params)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn fetch_page(
        &self,
        kind: ArtifactKind,
        date: NaiveDate,
        cursor: Option<&str>,
    ) -> Result<FetchPage, FetchError> {
        match kind {
            ArtifactKind::RawTranscript | ArtifactKind::StructuredContent => {
                let response = send(self.lifelogs_request(date, cursor)).await?;
                let body: LifelogsResponse = decode(response).await?;
                Ok(body.into())
            }
            ArtifactKind::Insight => {
                let response = send(self.chats_request(cursor)).await?;
                let body: ChatsResponse = decode(response).await?;
                Ok(body.into())
            }
            ArtifactKind::Summary | ArtifactKind::Analytics => Err(FetchError::Fatal {
                status: None,
                message: format!("{} is derived locally and has no remote feed", kind),
            }),
        }
    }
}

async fn send(request: RequestBuilder) -> Result<Response, FetchError> {
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::Transient(format!("request failed: {}", e)))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body)
        .unwrap_or_else(|| FetchError::Transient(format!("unexpected status {}", status))))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Transient(format!("failed to read body: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| FetchError::Transient(format!("undecodable response body: {}", e)))
}
