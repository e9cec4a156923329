use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::{advance_watermark, Database, User, WatermarkUpdate};
use crate::digest::build_digest;
use crate::hn::{ActivityItem, Fetched, HnClient};
use crate::mailer::Mailer;
use crate::token::UnsubscribeSigner;

/// Terminal outcome of one user's check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A digest was sent and the watermark advanced.
    Notified { items: usize },
    /// Nothing new; the watermark still advances (when configured) so scan
    /// windows stay bounded on inactive users.
    NothingNew,
    /// An upstream fetch failed; the watermark is untouched and the user is
    /// retried next cycle with the same `since`, so no gap opens.
    TransientFailure,
    /// Delivery failed after a successful fetch; the watermark is untouched.
    /// A duplicate digest next cycle is preferred over a lost one.
    SendFailure,
    /// Another cycle advanced the watermark first; this cycle's write was
    /// abandoned.
    Conflict,
}

/// Runs one subscriber through a full check cycle.
///
/// Owns no per-user state: everything it writes goes through the watermark
/// compare-and-swap, which also serializes overlapping cycles from other
/// processes.
#[derive(Clone)]
pub struct UserProcessor {
    hn: Arc<HnClient>,
    mailer: Arc<dyn Mailer>,
    db: Database,
    signer: Arc<UnsubscribeSigner>,
    public_base_url: String,
    advance_on_empty: bool,
}

impl UserProcessor {
    #[must_use]
    pub fn new(
        config: &Config,
        db: Database,
        hn: Arc<HnClient>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            hn,
            mailer,
            db,
            signer: Arc::new(UnsubscribeSigner::new(config.unsubscribe_secret.clone())),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            advance_on_empty: config.advance_on_empty,
        }
    }

    /// Check one subscriber for new activity and notify them.
    ///
    /// `checkpoint` is the candidate next watermark, recorded by the caller
    /// before any fetch is issued. It is injected rather than read from the
    /// clock here so the algorithm is deterministic under test.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected storage failures. Expected
    /// steady-state failures (upstream down, rate limited, delivery refused)
    /// are terminal [`CheckOutcome`] values, not errors.
    pub async fn process(&self, user: &User, checkpoint: DateTime<Utc>) -> Result<CheckOutcome> {
        let since = user.last_checked;

        // Both fetches are independent reads; run them concurrently. Neither
        // result is used unless both complete, so no partial digest is sent.
        let (replies, post_comments) = tokio::join!(
            self.hn.fetch_new_replies(&user.hn_username, since),
            self.hn.fetch_new_post_comments(&user.hn_username, since),
        );

        let (replies, post_comments) = match (replies, post_comments) {
            (Ok(replies), Ok(post_comments)) => (replies, post_comments),
            (Err(e), _) | (_, Err(e)) => {
                warn!(user = %user.hn_username, error = %e, "Upstream fetch failed");
                return Ok(CheckOutcome::TransientFailure);
            }
        };

        if replies.truncated || post_comments.truncated {
            warn!(user = %user.hn_username, "Activity scan hit the pagination cap");
        }

        let items = merge_items(replies, post_comments, checkpoint);

        if items.is_empty() {
            debug!(user = %user.hn_username, "No new activity");
            if self.advance_on_empty {
                match advance_watermark(self.db.pool(), &user.hn_username, since, checkpoint)
                    .await?
                {
                    WatermarkUpdate::Advanced => {}
                    WatermarkUpdate::Conflict => return Ok(CheckOutcome::Conflict),
                }
            }
            return Ok(CheckOutcome::NothingNew);
        }

        let token = self.signer.make_token(&user.hn_username);
        let unsubscribe_url = format!("{}/unsubscribe?token={token}", self.public_base_url);
        let digest = build_digest(&user.hn_username, &items, &unsubscribe_url);

        if let Err(e) = self
            .mailer
            .send(&user.email, &digest.subject, &digest.text, &digest.html)
            .await
        {
            warn!(user = %user.hn_username, error = %e, "Digest send failed");
            return Ok(CheckOutcome::SendFailure);
        }

        // Send and persist are not atomic: a crash here re-sends next cycle.
        // At-least-once, never lost.
        match advance_watermark(self.db.pool(), &user.hn_username, since, checkpoint).await? {
            WatermarkUpdate::Advanced => {
                debug!(
                    user = %user.hn_username,
                    items = items.len(),
                    "Digest sent, watermark advanced"
                );
                Ok(CheckOutcome::Notified { items: items.len() })
            }
            WatermarkUpdate::Conflict => {
                warn!(
                    user = %user.hn_username,
                    "Watermark advanced by a concurrent cycle; abandoning this write"
                );
                Ok(CheckOutcome::Conflict)
            }
        }
    }
}

/// Merge both fetch results into one deterministic digest ordering.
///
/// Items created after the checkpoint (born during the fetch window) are left
/// for the next cycle, so every item lands in exactly one digest.
fn merge_items(
    replies: Fetched,
    post_comments: Fetched,
    checkpoint: DateTime<Utc>,
) -> Vec<ActivityItem> {
    let mut items: Vec<ActivityItem> = replies
        .items
        .into_iter()
        .chain(post_comments.items)
        .filter(|item| item.created_at <= checkpoint)
        .collect();
    items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    items
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::hn::ActivityKind;

    fn item(id: i64, secs: i64, kind: ActivityKind) -> ActivityItem {
        ActivityItem {
            id,
            kind,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            excerpt: String::new(),
            url: format!("https://news.ycombinator.com/item?id={id}"),
        }
    }

    fn fetched(items: Vec<ActivityItem>) -> Fetched {
        Fetched {
            items,
            truncated: false,
        }
    }

    #[test]
    fn test_merge_sorts_ascending_across_kinds() {
        let checkpoint = Utc.timestamp_opt(1_000, 0).unwrap();
        let merged = merge_items(
            fetched(vec![item(3, 300, ActivityKind::CommentReply)]),
            fetched(vec![
                item(2, 200, ActivityKind::PostComment),
                item(1, 100, ActivityKind::PostComment),
            ]),
            checkpoint,
        );
        let ids: Vec<i64> = merged.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_merge_breaks_timestamp_ties_by_id() {
        let checkpoint = Utc.timestamp_opt(1_000, 0).unwrap();
        let merged = merge_items(
            fetched(vec![item(9, 100, ActivityKind::CommentReply)]),
            fetched(vec![item(4, 100, ActivityKind::PostComment)]),
            checkpoint,
        );
        let ids: Vec<i64> = merged.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![4, 9]);
    }

    #[test]
    fn test_merge_excludes_items_after_checkpoint() {
        let checkpoint = Utc.timestamp_opt(150, 0).unwrap();
        let merged = merge_items(
            fetched(vec![
                item(1, 100, ActivityKind::CommentReply),
                item(2, 200, ActivityKind::CommentReply),
            ]),
            fetched(vec![]),
            checkpoint,
        );
        let ids: Vec<i64> = merged.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1]);
    }
}
