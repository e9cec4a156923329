use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{excerpt_from_html, ActivityItem, ActivityKind};
use crate::config::Config;
use crate::constants::{HN_ITEM_URL_BASE, SEARCH_HITS_PER_PAGE, USER_AGENT};

/// A failed upstream fetch. All variants are transient from the caller's
/// perspective: nothing is mutated and the same `since` is safe to retry.
#[derive(Debug, Error)]
pub enum HnError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),
    #[error("upstream rate limited")]
    RateLimited,
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for HnError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}

/// The outcome of one fetch: the items found, plus whether the pagination cap
/// cut the scan short.
#[derive(Debug)]
pub struct Fetched {
    pub items: Vec<ActivityItem>,
    pub truncated: bool,
}

/// Client for the Algolia Hacker News search API.
///
/// Stateless: both fetch operations are pure queries over `(username, since)`.
/// The lookback window for the subscriber's own items is computed from `since`
/// rather than the ambient clock, so results are a function of the inputs.
#[derive(Debug, Clone)]
pub struct HnClient {
    http: reqwest::Client,
    base_url: String,
    max_pages: u32,
    scan_window: chrono::Duration,
}

impl HnClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.hn_api_base_url.trim_end_matches('/').to_string(),
            max_pages: config.max_search_pages,
            scan_window: chrono::Duration::from_std(config.scan_window)
                .unwrap_or_else(|_| chrono::Duration::days(14)),
        })
    }

    /// Fetch replies to the subscriber's comments created strictly after `since`.
    ///
    /// Enumerates the subscriber's own comments within the scan window, then
    /// walks each comment's direct children. Deleted or authorless children
    /// are skipped; the subscriber's own follow-ups are not replies.
    ///
    /// # Errors
    ///
    /// Returns an [`HnError`] if the upstream is unreachable, throttling, or
    /// returns an undecodable payload.
    pub async fn fetch_new_replies(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<Fetched, HnError> {
        let window_start = since - self.scan_window;
        let (own_comments, truncated) = self
            .search_pages(&format!("comment,author_{username}"), window_start)
            .await?;

        let mut items = Vec::new();
        for hit in &own_comments {
            let parent: ItemTree = self
                .get_json(&format!("{}/items/{}", self.base_url, hit.object_id))
                .await?;

            for child in parent.children {
                let Some(created_at) = child
                    .created_at_i
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                else {
                    continue;
                };
                let Some(author) = child.author.as_deref() else {
                    // Deleted comments come back authorless.
                    continue;
                };
                if author == username || created_at <= since {
                    continue;
                }
                items.push(ActivityItem {
                    id: child.id,
                    kind: ActivityKind::CommentReply,
                    created_at,
                    excerpt: excerpt_from_html(child.text.as_deref().unwrap_or_default()),
                    url: item_url(child.id),
                });
            }
        }

        debug!(
            user = username,
            count = items.len(),
            truncated,
            "Fetched comment replies"
        );
        Ok(Fetched { items, truncated })
    }

    /// Fetch comments on the subscriber's posts created strictly after `since`.
    ///
    /// # Errors
    ///
    /// Returns an [`HnError`] if the upstream is unreachable, throttling, or
    /// returns an undecodable payload.
    pub async fn fetch_new_post_comments(
        &self,
        username: &str,
        since: DateTime<Utc>,
    ) -> Result<Fetched, HnError> {
        let window_start = since - self.scan_window;
        let (own_stories, mut truncated) = self
            .search_pages(&format!("story,author_{username}"), window_start)
            .await?;

        let mut items = Vec::new();
        for story in &own_stories {
            let (comments, story_truncated) = self
                .search_pages(&format!("comment,story_{}", story.object_id), since)
                .await?;
            truncated = truncated || story_truncated;

            for hit in comments {
                let Some(created_at) = Utc.timestamp_opt(hit.created_at_i, 0).single() else {
                    continue;
                };
                if hit.author.as_deref() == Some(username) || created_at <= since {
                    continue;
                }
                let id: i64 = hit.object_id.parse().map_err(|_| {
                    HnError::Malformed(format!("non-numeric objectID '{}'", hit.object_id))
                })?;
                items.push(ActivityItem {
                    id,
                    kind: ActivityKind::PostComment,
                    created_at,
                    excerpt: excerpt_from_html(hit.comment_text.as_deref().unwrap_or_default()),
                    url: item_url(id),
                });
            }
        }

        debug!(
            user = username,
            count = items.len(),
            truncated,
            "Fetched post comments"
        );
        Ok(Fetched { items, truncated })
    }

    /// Page through `search_by_date` for items created strictly after `floor`.
    ///
    /// Stops at `max_pages` and reports the cut via the returned flag; below
    /// the cap every page is collected, never silently dropped.
    async fn search_pages(
        &self,
        tags: &str,
        floor: DateTime<Utc>,
    ) -> Result<(Vec<SearchHit>, bool), HnError> {
        let mut hits = Vec::new();
        let mut page = 0u32;

        loop {
            let url = format!(
                "{}/search_by_date?tags={}&hitsPerPage={}&page={}&numericFilters=created_at_i>{}",
                self.base_url,
                tags,
                SEARCH_HITS_PER_PAGE,
                page,
                floor.timestamp(),
            );
            let response: SearchResponse = self.get_json(&url).await?;
            hits.extend(response.hits);

            page += 1;
            if page >= response.nb_pages {
                return Ok((hits, false));
            }
            if page >= self.max_pages {
                return Ok((hits, true));
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HnError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(HnError::RateLimited),
            status if !status.is_success() => {
                Err(HnError::Unavailable(format!("status {status}")))
            }
            _ => response.json().await.map_err(HnError::from),
        }
    }
}

fn item_url(id: i64) -> String {
    format!("{HN_ITEM_URL_BASE}?id={id}")
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
    #[serde(rename = "nbPages")]
    nb_pages: u32,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "objectID")]
    object_id: String,
    created_at_i: i64,
    author: Option<String>,
    comment_text: Option<String>,
}

/// An item from the `/items/{id}` endpoint, with its direct children.
#[derive(Debug, Deserialize)]
struct ItemTree {
    id: i64,
    created_at_i: Option<i64>,
    author: Option<String>,
    text: Option<String>,
    #[serde(default)]
    children: Vec<ItemTree>,
}
