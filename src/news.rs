//! News feed: fixed-size client paging and the bounded merge used when the
//! stored feed is refreshed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub const NEWS_PAGE_SIZE: usize = 5;
pub const NEWS_RETENTION: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: String,
    /// `YYYY-MM-DD`; compared as text.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsPager {
    items: Vec<NewsItem>,
    visible: usize,
}

impl NewsPager {
    pub fn new(items: Vec<NewsItem>) -> Self {
        let visible = items.len().min(NEWS_PAGE_SIZE);
        Self { items, visible }
    }

    pub fn visible_items(&self) -> &[NewsItem] {
        &self.items[..self.visible]
    }

    pub fn has_more(&self) -> bool {
        self.visible < self.items.len()
    }

    /// Reveals the next batch; returns how many items became visible.
    pub fn load_more(&mut self) -> usize {
        let before = self.visible;
        self.visible = (self.visible + NEWS_PAGE_SIZE).min(self.items.len());
        self.visible - before
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsPage {
    pub items: Vec<NewsItem>,
    pub shown: usize,
    pub total: usize,
    pub has_more: bool,
}

impl From<&NewsPager> for NewsPage {
    fn from(pager: &NewsPager) -> Self {
        Self {
            items: pager.visible_items().to_vec(),
            shown: pager.visible,
            total: pager.items.len(),
            has_more: pager.has_more(),
        }
    }
}

/// Adds `incoming` items whose id is not already stored, newest date first,
/// keeping at most [`NEWS_RETENTION`] entries.
///
/// Items without an id are never treated as duplicates. On equal dates the
/// incoming items sort ahead of the stored ones.
pub fn merge_news(existing: Vec<NewsItem>, incoming: Vec<NewsItem>) -> Vec<NewsItem> {
    let known: HashSet<String> = existing.iter().filter_map(|item| item.id.clone()).collect();

    let mut combined: Vec<NewsItem> = incoming
        .into_iter()
        .filter(|item| item.id.as_ref().is_none_or(|id| !known.contains(id)))
        .collect();
    combined.extend(existing);
    combined.sort_by(|a, b| b.date.cmp(&a.date));
    combined.truncate(NEWS_RETENTION);
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, date: &str) -> NewsItem {
        NewsItem {
            id: Some(id.to_string()),
            title: format!("title {id}"),
            summary: String::new(),
            category: "市場".to_string(),
            source: "港報".to_string(),
            date: date.to_string(),
            url: String::new(),
        }
    }

    fn items(count: usize) -> Vec<NewsItem> {
        (0..count)
            .map(|i| item(&i.to_string(), &format!("2025-01-{:02}", 28 - i)))
            .collect()
    }

    #[test]
    fn pager_reveals_batches_of_five() {
        let mut pager = NewsPager::new(items(12));
        assert_eq!(pager.visible_items().len(), 5);
        assert!(pager.has_more());

        assert_eq!(pager.load_more(), 5);
        assert_eq!(pager.visible_items().len(), 10);
        assert_eq!(pager.load_more(), 2);
        assert!(!pager.has_more());
        assert_eq!(pager.load_more(), 0);
        assert_eq!(pager.visible_items().len(), 12);
    }

    #[test]
    fn short_and_empty_feeds_have_nothing_more() {
        let pager = NewsPager::new(items(3));
        assert_eq!(pager.visible_items().len(), 3);
        assert!(!pager.has_more());

        let empty = NewsPager::new(Vec::new());
        let page = NewsPage::from(&empty);
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[test]
    fn merge_skips_known_ids_and_sorts_newest_first() {
        let existing = vec![item("a", "2025-01-01"), item("b", "2025-01-03")];
        let mut dup = item("a", "2025-02-01");
        dup.title = "replacement".to_string();
        let incoming = vec![dup, item("c", "2025-01-02")];

        let merged = merge_news(existing, incoming);
        let ids: Vec<&str> = merged.iter().filter_map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(merged[2].title, "title a");
    }

    #[test]
    fn merge_keeps_at_most_fifteen() {
        let older: Vec<NewsItem> = (10..20)
            .map(|i| item(&i.to_string(), "2024-12-01"))
            .collect();
        let merged = merge_news(items(10), older);
        assert_eq!(merged.len(), NEWS_RETENTION);
        assert_eq!(merged[0].id.as_deref(), Some("0"));
    }

    #[test]
    fn item_decodes_without_optional_fields() {
        let parsed: NewsItem =
            serde_json::from_str(r#"{"title": "初鰹の水揚げ", "date": "2025-04-01"}"#).unwrap();
        assert!(parsed.id.is_none());
        assert_eq!(parsed.summary, "");
    }
}
