#![deny(clippy::all)]

use crate::domain::{
    Category, EngagementDelta, LikesMetadata, ListQuery, PagedListSnapshot, ToggleOutcome,
    UserId, UserObject,
};
use async_trait::async_trait;
use shared::Result;

// Ports are the seams to the external collaborators. Adapters live in
// `persistence` (local, sled) and in the `upstream-http` crate (reqwest).

/// Port for the identity/metadata provider: whole-object read and replace.
#[async_trait]
pub trait UserObjectStore: Send + Sync + 'static {
    /// Read the user object. A user that has never been written reads as an
    /// empty object.
    async fn read_user(&self, user_id: &UserId) -> Result<UserObject>;

    /// Replace the user object. There is no server-side merge.
    async fn write_user(&self, user: UserObject) -> Result<()>;
}

/// Port for the remote paginated record store.
#[async_trait]
pub trait ContentApi<R>: Send + Sync + 'static {
    async fn list(
        &self,
        query: &ListQuery,
        continuation: Option<&str>,
    ) -> Result<PagedListSnapshot<R>>;

    /// Adjust the authoritative counters of one record.
    async fn patch_counters(&self, record_id: &str, deltas: &[EngagementDelta]) -> Result<()>;

    /// Create a comment under `parent_id` and return the stored copy.
    async fn create_comment(&self, parent_id: &str, comment: &R) -> Result<R>;
}

/// Port for persisting likes, either in-process or through the HTTP surface.
#[async_trait]
pub trait LikesBackend: Send + Sync + 'static {
    async fn toggle(
        &self,
        user_id: &UserId,
        category: Category,
        record_id: &str,
    ) -> Result<ToggleOutcome>;

    async fn merge(&self, user_id: &UserId, incoming: LikesMetadata) -> Result<LikesMetadata>;
}

/// Local "already migrated" marker, so the merge runs once per user per device.
pub trait MigrationMarker: Send + Sync + 'static {
    fn is_migrated(&self, user_id: &UserId) -> Result<bool>;
    fn mark_migrated(&self, user_id: &UserId) -> Result<()>;
}
