use crate::domain::{LikesMetadata, UserId};
use crate::ports::{LikesBackend, MigrationMarker};
use shared::Result;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// This device already merged its likes for the user.
    AlreadyMigrated,
    /// Nothing held locally; the marker is set so the check is not repeated.
    NothingToMigrate,
    Merged(LikesMetadata),
}

/// Push likes collected on this device before sign-in into the user's store,
/// once. The marker is only set after the merge is acknowledged, so a failed
/// merge is retried on the next call.
pub async fn migrate_local_likes(
    backend: &dyn LikesBackend,
    marker: &dyn MigrationMarker,
    user_id: &UserId,
    local: LikesMetadata,
) -> Result<MigrationOutcome> {
    if marker.is_migrated(user_id)? {
        debug!("Likes for user '{}' already migrated on this device", user_id);
        return Ok(MigrationOutcome::AlreadyMigrated);
    }

    if local.is_empty() {
        marker.mark_migrated(user_id)?;
        return Ok(MigrationOutcome::NothingToMigrate);
    }

    let local_total = local.total();
    let merged = backend.merge(user_id, local).await?;
    marker.mark_migrated(user_id)?;

    info!(
        "Migrated {} local likes for user '{}' ({} stored)",
        local_total,
        user_id,
        merged.total()
    );
    Ok(MigrationOutcome::Merged(merged))
}
