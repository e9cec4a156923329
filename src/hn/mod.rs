mod client;

pub use client::{Fetched, HnClient, HnError};

use chrono::{DateTime, Utc};
use scraper::Html;

use crate::constants::EXCERPT_MAX_CHARS;

/// What kind of activity an item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// Someone replied to one of the subscriber's comments.
    CommentReply,
    /// Someone commented on one of the subscriber's posts.
    PostComment,
}

impl ActivityKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::CommentReply => "reply to your comment",
            Self::PostComment => "comment on your post",
        }
    }
}

/// One new piece of activity for a subscriber. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityItem {
    pub id: i64,
    pub kind: ActivityKind,
    pub created_at: DateTime<Utc>,
    /// Markup-stripped display excerpt.
    pub excerpt: String,
    /// Direct link to the item on news.ycombinator.com.
    pub url: String,
}

/// Strip HTML markup, returning the rendered text content.
///
/// Upstream comment bodies carry raw markup; downstream consumers (the digest
/// formatter) must never see it.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect::<String>()
}

/// Strip markup and bound the result for display in a digest.
#[must_use]
pub fn excerpt_from_html(html: &str) -> String {
    let text = html_to_text(html);
    let trimmed = text.trim();
    if trimmed.chars().count() <= EXCERPT_MAX_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_MAX_CHARS).collect();
    format!("{cut}…")
}
