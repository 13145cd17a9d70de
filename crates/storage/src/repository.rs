use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::KeyValueStore;

/// A typed list persisted as one JSON array under a single storage key.
pub struct ListRepository<T> {
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
    _items: PhantomData<fn() -> T>,
}

impl<T> Clone for ListRepository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key,
            _items: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> ListRepository<T> {
    pub fn new(store: Arc<dyn KeyValueStore>, key: &'static str) -> Self {
        Self {
            store,
            key,
            _items: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Returns `None` when the key was never written or holds something that
    /// is not a JSON array of `T`; callers fall back to their default list.
    pub fn load(&self) -> Result<Option<Vec<T>>> {
        let Some(raw) = self.store.get(self.key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Vec<T>>(&raw) {
            Ok(items) => Ok(Some(items)),
            Err(err) => {
                warn!(
                    key = self.key,
                    error = %err,
                    "stored list is not valid JSON; using defaults"
                );
                Ok(None)
            }
        }
    }

    pub fn save(&self, items: &[T]) -> Result<()> {
        let raw = serde_json::to_string(items)
            .with_context(|| format!("serialize list {}", self.key))?;
        self.store.set(self.key, &raw)
    }

    /// Forget the stored list entirely; the next `load` sees `None`.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn load_missing_key_is_none() {
        let repo: ListRepository<String> = ListRepository::new(Arc::new(MemoryStore::new()), "k");
        assert!(repo.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let store = Arc::new(MemoryStore::new());
        let repo: ListRepository<String> = ListRepository::new(store.clone(), "k");
        repo.save(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(r#"["a","b"]"#));
        assert_eq!(repo.load().unwrap(), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn clear_removes_the_key() {
        let store = Arc::new(MemoryStore::new());
        let repo: ListRepository<String> = ListRepository::new(store.clone(), "k");
        repo.save(&["a".to_string()]).unwrap();
        repo.clear().unwrap();
        assert!(store.is_empty());
        assert!(repo.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_value_loads_as_none() {
        let store = Arc::new(MemoryStore::new());
        store.set("k", "{not json").unwrap();
        let repo: ListRepository<String> = ListRepository::new(store, "k");
        assert!(repo.load().unwrap().is_none());
    }
}
