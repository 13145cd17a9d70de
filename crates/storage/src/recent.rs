use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::{KeyValueStore, ListRepository};

pub const RECENT_SEARCHES_KEY: &str = "hyperscanRecentSearches";
pub const MAX_RECENT_SEARCHES: usize = 5;

/// Shown until the user has searched for anything.
fn default_recent_searches() -> Vec<String> {
    ["Smartphone", "Bluetooth Headphones", "Smartwatch"]
        .into_iter()
        .map(ToString::to_string)
        .collect()
}

/// Trimmed query with its first character upper-cased, as it is displayed
/// in the recent-search tags.
pub fn display_query(query: &str) -> String {
    let query = query.trim();
    let mut chars = query.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Most-recent-first list of past queries, unique ignoring case, at most
/// [`MAX_RECENT_SEARCHES`] long.
pub struct RecentSearches {
    repo: ListRepository<String>,
    items: Vec<String>,
}

impl RecentSearches {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let repo: ListRepository<String> = ListRepository::new(store, RECENT_SEARCHES_KEY);
        let mut items = repo.load()?.unwrap_or_else(default_recent_searches);
        items.truncate(MAX_RECENT_SEARCHES);
        Ok(Self { repo, items })
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Move (or insert) `query` to the front.  Returns `false` without
    /// touching storage when the query is blank.
    pub fn record(&mut self, query: &str) -> Result<bool> {
        let display = display_query(query);
        if display.is_empty() {
            return Ok(false);
        }

        let folded = display.to_lowercase();
        let mut next = Vec::with_capacity(MAX_RECENT_SEARCHES);
        next.push(display);
        next.extend(
            self.items
                .iter()
                .filter(|item| item.to_lowercase() != folded)
                .cloned(),
        );
        next.truncate(MAX_RECENT_SEARCHES);

        self.repo.save(&next)?;
        self.items = next;
        debug!(count = self.items.len(), "recent searches updated");
        Ok(true)
    }

    /// Remove the tag matching `tag` ignoring case.
    pub fn remove(&mut self, tag: &str) -> Result<bool> {
        let folded = tag.trim().to_lowercase();
        let next: Vec<String> = self
            .items
            .iter()
            .filter(|item| item.to_lowercase() != folded)
            .cloned()
            .collect();
        if next.len() == self.items.len() {
            return Ok(false);
        }
        self.repo.save(&next)?;
        self.items = next;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.repo.save(&[])?;
        self.items.clear();
        Ok(())
    }
}
