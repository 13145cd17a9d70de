//! Client-side persisted lists: recent searches, the comparison list and the
//! saved list.
//!
//! Each list is loaded once at startup, mutated in place by its single owner,
//! and written back immediately on every mutation.  Values are stored as
//! string-serialised JSON under fixed keys in a [`KeyValueStore`].

mod kv;
mod offers;
mod recent;
mod repository;

pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use offers::{COMPARISON_LIST_KEY, OfferList, SAVED_LIST_KEY};
pub use recent::{MAX_RECENT_SEARCHES, RECENT_SEARCHES_KEY, RecentSearches, display_query};
pub use repository::ListRepository;
