pub mod clock;
pub mod pattern;
pub mod session_cache;

pub use clock::{Clock, ManualClock, SystemClock, current_timestamp_ms};
pub use pattern::KeyPattern;
pub use session_cache::{CacheEntry, CacheStats, SessionCache, SessionCacheConfig};
