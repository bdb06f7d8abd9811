// Cache module for API responses.
// In-memory TTL store plus the key scheme the API client uses.

pub mod keys;
pub mod store;

pub use store::{CacheEntry, DEFAULT_TTL, SWEEP_INTERVAL, SweeperHandle, TtlCache};
