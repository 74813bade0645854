//! Engagement state for paged content lists: a bounded session cache, pure
//! optimistic mutations over cached pages, a per-user likes store, and the
//! coordinator that applies, persists and rolls back.

pub mod cache;
pub mod domain;
pub mod likes;
pub mod mutation;
pub mod persistence;
pub mod ports;
pub mod sync;

pub use cache::{SessionCache, SessionCacheConfig};
pub use domain::{
    Category, ContentRecord, EngagementDelta, EngagementField, EngagementRecord, LikesMetadata,
    ListQuery, PagedListSnapshot, ToggleOutcome, UserId, UserObject,
};
pub use likes::LikesStore;
pub use sync::{ActionOutcome, LikeAction, SyncCoordinator};
