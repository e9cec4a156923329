//! Digest formatting.
//!
//! Pure functions from a subscriber's new activity to one email. Deterministic
//! by construction: the same user and item list always produce byte-identical
//! subject and bodies, which keeps a retried send idempotent to render.

use chrono::{DateTime, Utc};
use maud::{html, DOCTYPE};

use crate::hn::ActivityItem;

/// A fully rendered notification email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Render an item timestamp in the fixed, locale-independent digest format.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%H:%M %d-%m").to_string()
}

/// Build the digest email for one subscriber.
///
/// `items` must be non-empty and pre-sorted ascending by creation time; the
/// formatter renders them in the order given. No network or storage access.
#[must_use]
pub fn build_digest(username: &str, items: &[ActivityItem], unsubscribe_url: &str) -> Digest {
    let subject = if items.len() == 1 {
        "1 new reply on Hacker News".to_string()
    } else {
        format!("{} new replies on Hacker News", items.len())
    };

    Digest {
        subject,
        text: text_body(username, items, unsubscribe_url),
        html: html_body(username, items, unsubscribe_url),
    }
}

fn text_body(username: &str, items: &[ActivityItem], unsubscribe_url: &str) -> String {
    let mut body = format!(
        "Hi {username},\n\nNew activity on your Hacker News comments and posts:\n\n"
    );

    for item in items {
        body.push_str(&format!(
            "- {} [{}]\n  {}\n  {}\n\n",
            format_timestamp(item.created_at),
            item.kind.label(),
            item.excerpt,
            item.url,
        ));
    }

    body.push_str(&format!("Unsubscribe: {unsubscribe_url}\n"));
    body
}

fn html_body(username: &str, items: &[ActivityItem], unsubscribe_url: &str) -> String {
    let markup = html! {
        (DOCTYPE)
        html {
            body style="font-family: sans-serif; max-width: 600px;" {
                p { "Hi " (username) "," }
                p { "New activity on your Hacker News comments and posts:" }
                ul {
                    @for item in items {
                        li style="margin-bottom: 12px;" {
                            span style="color: #828282;" {
                                (format_timestamp(item.created_at)) " [" (item.kind.label()) "]"
                            }
                            br;
                            (item.excerpt)
                            br;
                            a href=(item.url) { (item.url) }
                        }
                    }
                }
                p {
                    a href=(unsubscribe_url) { "Unsubscribe" }
                }
            }
        }
    };
    markup.into_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::hn::ActivityKind;

    fn item(id: i64, secs: i64, excerpt: &str) -> ActivityItem {
        ActivityItem {
            id,
            kind: ActivityKind::CommentReply,
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            excerpt: excerpt.to_string(),
            url: format!("https://news.ycombinator.com/item?id={id}"),
        }
    }

    #[test]
    fn test_format_timestamp_fixed_layout() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 9, 7, 0).unwrap();
        assert_eq!(format_timestamp(at), "09:07 05-03");
    }

    #[test]
    fn test_digest_is_deterministic() {
        let items = vec![item(1, 1_700_000_000, "first"), item(2, 1_700_000_060, "second")];
        let a = build_digest("alice", &items, "https://hnalerts.test/unsubscribe?token=t");
        let b = build_digest("alice", &items, "https://hnalerts.test/unsubscribe?token=t");
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_preserves_item_order() {
        let items = vec![item(1, 1_700_000_000, "first"), item(2, 1_700_000_060, "second")];
        let digest = build_digest("alice", &items, "https://hnalerts.test/u");
        let first = digest.text.find("first").unwrap();
        let second = digest.text.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_subject_counts_items() {
        let one = build_digest("alice", &[item(1, 0, "x")], "u");
        assert_eq!(one.subject, "1 new reply on Hacker News");

        let two = build_digest(
            "alice",
            &[item(1, 0, "x"), item(2, 60, "y")],
            "u",
        );
        assert_eq!(two.subject, "2 new replies on Hacker News");
    }

    #[test]
    fn test_bodies_embed_unsubscribe_link() {
        let digest = build_digest("alice", &[item(1, 0, "x")], "https://hnalerts.test/unsub?token=abc");
        assert!(digest.text.contains("https://hnalerts.test/unsub?token=abc"));
        assert!(digest.html.contains("https://hnalerts.test/unsub?token=abc"));
    }

    #[test]
    fn test_html_body_escapes_excerpt() {
        let digest = build_digest("alice", &[item(1, 0, "a < b & c")], "u");
        assert!(digest.html.contains("a &lt; b &amp; c"));
    }
}
