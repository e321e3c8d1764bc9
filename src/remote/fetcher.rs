//! Day-level fetching on top of the page-level remote API
//!
//! `PageFetcher` turns a (kind, date) pair into the complete ordered list of
//! records for that day. It walks the cursor chain, retries individual pages
//! under the page-level [`RetryPolicy`], bounds in-flight requests with a
//! shared semaphore and spaces consecutive pages by the configured delay.

use crate::config::Config;
use crate::remote::traits::{FetchError, RemoteApi};
use crate::remote::types::{FetchPage, Record};
use crate::retry::{backoff, RetryPolicy};
use crate::state::ArtifactKind;
use crate::ConfigError;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Fetches every record of one artifact kind for one date
pub struct PageFetcher {
    api: Arc<dyn RemoteApi>,
    policy: RetryPolicy,
    limiter: Arc<Semaphore>,
    request_delay: Duration,
    timezone: Tz,
    max_insight_pages: u32,
    max_pages_per_day: u32,
}

impl PageFetcher {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        policy: RetryPolicy,
        max_concurrent_requests: usize,
        request_delay: Duration,
        timezone: Tz,
        max_insight_pages: u32,
        max_pages_per_day: u32,
    ) -> Self {
        Self {
            api,
            policy,
            limiter: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            request_delay,
            timezone,
            max_insight_pages: max_insight_pages.max(1),
            max_pages_per_day: max_pages_per_day.max(1),
        }
    }

    /// Creates a fetcher with the page retry policy and limits from `config`
    pub fn from_config(api: Arc<dyn RemoteApi>, config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            api,
            config.retry.page.policy(),
            config.api.max_concurrent_requests as usize,
            Duration::from_millis(config.api.request_delay_ms),
            config.timezone()?,
            config.api.max_insight_pages,
            config.api.max_pages_per_day,
        ))
    }

    /// Returns all records of `kind` for `date`, in the order the service returned them
    ///
    /// Items gathered from earlier pages survive a failing page: the retry
    /// resumes at that page's cursor. An empty result means the service has
    /// no data for the day. A cursor chain that revisits a cursor, or a
    /// lifelog day longer than `max-pages-per-day`, is an error: the day is
    /// never returned partially.
    pub async fn fetch_day(
        &self,
        kind: ArtifactKind,
        date: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Vec<Record>, FetchError> {
        if !kind.is_remote() {
            return Err(FetchError::Fatal {
                status: None,
                message: format!("{} is not fetched from the remote service", kind),
            });
        }

        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();
        let mut pages: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            if pages > 0 && !backoff(self.request_delay, cancel).await {
                return Err(FetchError::Cancelled);
            }

            let page = self
                .fetch_page_with_retry(kind, date, cursor.as_deref(), cancel)
                .await?;
            pages += 1;

            tracing::debug!(
                kind = %kind,
                date = %date,
                page = pages,
                items = page.items.len(),
                has_more = page.next_cursor.is_some(),
                "Fetched page"
            );

            let FetchPage { items: page_items, next_cursor } = page;

            let mut reached_older = false;
            if kind == ArtifactKind::Insight {
                reached_older = self.collect_insights(date, page_items, &mut items);
            } else {
                items.extend(page_items);
            }

            let next = match next_cursor {
                Some(next) => next,
                None => break,
            };
            if kind == ArtifactKind::Insight {
                if reached_older {
                    break;
                }
                if pages >= self.max_insight_pages {
                    tracing::warn!(
                        date = %date,
                        pages,
                        "Stopped scanning chats at max-insight-pages"
                    );
                    break;
                }
            } else if pages >= self.max_pages_per_day {
                return Err(FetchError::Fatal {
                    status: None,
                    message: format!(
                        "{} for {} still has more pages after {} (max-pages-per-day)",
                        kind, date, pages
                    ),
                });
            }
            if !seen.insert(next.clone()) {
                tracing::warn!(kind = %kind, date = %date, cursor = %next, "Remote repeated a cursor");
                return Err(FetchError::Transient(format!(
                    "cursor {} was returned twice for {} {}",
                    next, kind, date
                )));
            }
            cursor = Some(next);
        }

        Ok(items)
    }

    /// Fetches one page, retrying transient failures
    async fn fetch_page_with_retry(
        &self,
        kind: ArtifactKind,
        date: NaiveDate,
        cursor: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<FetchPage, FetchError> {
        let mut state = self.policy.start();

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let attempt = state.begin();
            let result = {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .map_err(|_| FetchError::Transient("request limiter closed".to_string()))?;
                self.api.fetch_page(kind, date, cursor).await
            };

            let err = match result {
                Ok(page) => return Ok(page),
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };

            match state.record_failure() {
                Some(delay) => {
                    tracing::warn!(
                        kind = %kind,
                        date = %date,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Page request failed, retrying"
                    );
                    if !backoff(delay, cancel).await {
                        return Err(FetchError::Cancelled);
                    }
                }
                None => {
                    return Err(FetchError::Exhausted {
                        attempts: state.attempts(),
                        last: err.to_string(),
                    });
                }
            }
        }
    }

    /// Keeps the daily-insight chats created on `date`
    ///
    /// Returns true once the page shows the feed has moved past `date`
    /// (chats newest first, last one older than the day).
    fn collect_insights(&self, date: NaiveDate, page: Vec<Record>, out: &mut Vec<Record>) -> bool {
        let created: Vec<Option<NaiveDate>> = page
            .iter()
            .map(|record| {
                record
                    .as_chat()
                    .and_then(|chat| chat.created_at())
                    .map(|at| at.with_timezone(&self.timezone).date_naive())
            })
            .collect();

        let known: Vec<NaiveDate> = created.iter().flatten().copied().collect();
        let newest_first = known.windows(2).all(|w| w[0] >= w[1]);
        let reached_older = newest_first && known.last().map_or(false, |last| *last < date);

        for (record, day) in page.into_iter().zip(created) {
            let is_insight = record.as_chat().map_or(false, |chat| chat.is_daily_insight());
            if is_insight && day == Some(date) {
                out.push(record);
            }
        }

        reached_older
    }
}
