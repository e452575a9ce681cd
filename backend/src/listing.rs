use chrono::{DateTime, Utc};

use crate::models::{Comment, News};

/// A record that is ordered by a single point in time. Sorts over it are stable:
/// equal timestamps keep the order in which the records were fetched.
pub trait Chronological {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Most recent first, truncated to `limit`.
pub fn newest_first<T: Chronological>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    items.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    items.truncate(limit);
    items
}

/// Oldest first.
pub fn oldest_first<T: Chronological>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by_key(Chronological::timestamp);
    items
}

/// Home feed ordering: publication date descending, at most `limit` items.
pub fn sort_news(items: Vec<News>, limit: usize) -> Vec<News> {
    newest_first(items, limit)
}

/// Thread ordering: creation time ascending.
pub fn sort_comments(items: Vec<Comment>) -> Vec<Comment> {
    oldest_first(items)
}
