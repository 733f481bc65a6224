//! Cache domain - keys, entries and the tier store contract

mod entry;
mod key;
mod repository;

pub use entry::{current_time_millis, CacheEntry, TierMetadata};
pub use key::{CacheKey, KeyDeriver, RequestPayload};
pub use repository::EntryStore;

#[cfg(test)]
pub use repository::mock::MockEntryStore;
