use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use hyperscan_core::Offer;

use crate::{KeyValueStore, ListRepository};

pub const COMPARISON_LIST_KEY: &str = "hyperscanComparisonList";
pub const SAVED_LIST_KEY: &str = "hyperscanSavedList";

/// An insertion-ordered list of offers, unique by `link`.
///
/// Backs both the comparison list and the saved list.
pub struct OfferList {
    repo: ListRepository<Offer>,
    items: Vec<Offer>,
}

impl OfferList {
    pub fn load(store: Arc<dyn KeyValueStore>, key: &'static str) -> Result<Self> {
        let repo: ListRepository<Offer> = ListRepository::new(store, key);
        let stored = repo.load()?.unwrap_or_default();

        let mut seen = HashSet::new();
        let before = stored.len();
        let items: Vec<Offer> = stored
            .into_iter()
            .filter(|offer| seen.insert(offer.link.clone()))
            .collect();
        if items.len() != before {
            warn!(key, dropped = before - items.len(), "stored list had duplicate links");
        }

        Ok(Self { repo, items })
    }

    pub fn comparison(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::load(store, COMPARISON_LIST_KEY)
    }

    pub fn saved(store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::load(store, SAVED_LIST_KEY)
    }

    pub fn items(&self) -> &[Offer] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, link: &str) -> bool {
        self.items.iter().any(|item| item.link == link)
    }

    /// Append `offer` unless an offer with the same link is already present.
    pub fn add(&mut self, offer: Offer) -> Result<bool> {
        if self.items.iter().any(|item| item.same_listing(&offer)) {
            return Ok(false);
        }
        let mut next = self.items.clone();
        next.push(offer);
        self.repo.save(&next)?;
        self.items = next;
        debug!(key = self.repo.key(), count = self.items.len(), "offer added");
        Ok(true)
    }

    pub fn remove(&mut self, link: &str) -> Result<bool> {
        if !self.contains(link) {
            return Ok(false);
        }
        let next: Vec<Offer> = self
            .items
            .iter()
            .filter(|item| item.link != link)
            .cloned()
            .collect();
        self.repo.save(&next)?;
        self.items = next;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.repo.clear()?;
        self.items.clear();
        Ok(())
    }
}
