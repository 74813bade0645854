use super::lock::UserLockTable;
use super::validation::{validate_likes, validate_record_id};
use crate::domain::{Category, LikesMetadata, ToggleOutcome, UserId};
use crate::ports::{LikesBackend, UserObjectStore};
use async_trait::async_trait;
use chrono::Utc;
use shared::Result;
use std::sync::Arc;
use tracing::{error, info};

/// Pure membership test.
pub fn is_liked(metadata: &LikesMetadata, category: Category, record_id: &str) -> bool {
    metadata.contains(category, record_id.trim())
}

/// Union of two likes sets, category by category. Ids already in `current`
/// keep their position; new ids from `incoming` follow in their own order.
pub fn union_likes(current: &LikesMetadata, incoming: &LikesMetadata) -> LikesMetadata {
    let mut merged = current.clone();
    for (category, ids) in incoming.categories() {
        let entry = merged.entry_mut(category);
        for id in ids {
            if !entry.contains(id) {
                entry.push(id.clone());
            }
        }
    }
    merged
}

/// Durable per-user likes, stored inside the user object of the identity
/// provider.
///
/// The provider only offers whole-object replace, so `toggle` and `merge` do a
/// read-modify-write while holding the user's slot in the lock table. A
/// second call for the same user during that window is rejected.
pub struct LikesStore {
    users: Arc<dyn UserObjectStore>,
    locks: UserLockTable,
}

impl LikesStore {
    pub fn new(users: Arc<dyn UserObjectStore>) -> Self {
        Self {
            users,
            locks: UserLockTable::new(),
        }
    }

    pub fn locks(&self) -> &UserLockTable {
        &self.locks
    }

    /// Current likes, read without taking the lock.
    pub async fn get(&self, user_id: &UserId) -> Result<LikesMetadata> {
        Ok(self.users.read_user(user_id).await?.likes())
    }

    /// Flip membership of `record_id` in `category`.
    pub async fn toggle(
        &self,
        user_id: &UserId,
        category: Category,
        record_id: &str,
    ) -> Result<ToggleOutcome> {
        let (liked, metadata) = self
            .read_modify_write(user_id, |likes| {
                let record_id = validate_record_id(record_id)?;
                let ids = likes.entry_mut(category);
                Ok(match ids.iter().position(|id| id == record_id) {
                    Some(pos) => {
                        ids.remove(pos);
                        false
                    }
                    None => {
                        ids.push(record_id.to_string());
                        true
                    }
                })
            })
            .await?;

        info!(
            "User '{}' {} {} '{}'",
            user_id,
            if liked { "liked" } else { "unliked" },
            category,
            record_id.trim()
        );
        Ok(ToggleOutcome { liked, metadata })
    }

    /// Fold `incoming` into the stored likes (set union per category).
    pub async fn merge(&self, user_id: &UserId, incoming: LikesMetadata) -> Result<LikesMetadata> {
        let incoming_total = incoming.total();
        let ((), metadata) = self
            .read_modify_write(user_id, |likes| {
                *likes = union_likes(likes, &incoming);
                Ok(())
            })
            .await?;

        info!(
            "Merged {} incoming likes for user '{}' ({} stored)",
            incoming_total,
            user_id,
            metadata.total()
        );
        Ok(metadata)
    }

    async fn read_modify_write<T, F>(&self, user_id: &UserId, modify: F) -> Result<(T, LikesMetadata)>
    where
        F: FnOnce(&mut LikesMetadata) -> Result<T> + Send,
        T: Send,
    {
        // Held until the write settles; dropped on every return path.
        let _guard = self.locks.try_acquire(user_id)?;

        let mut user = self.users.read_user(user_id).await?;
        let mut likes = user.likes();

        let validated = modify(&mut likes)
            .and_then(|outcome| validate_likes(likes).map(|likes| (outcome, likes)));
        let (outcome, likes) = validated.inspect_err(|e| {
            error!("Refusing to persist likes for user '{}': {}", user_id, e);
        })?;

        user.set_likes(&likes)?;
        user.updated_at = Some(Utc::now());
        self.users.write_user(user).await?;

        Ok((outcome, likes))
    }
}

#[async_trait]
impl LikesBackend for LikesStore {
    async fn toggle(
        &self,
        user_id: &UserId,
        category: Category,
        record_id: &str,
    ) -> Result<ToggleOutcome> {
        LikesStore::toggle(self, user_id, category, record_id).await
    }

    async fn merge(&self, user_id: &UserId, incoming: LikesMetadata) -> Result<LikesMetadata> {
        LikesStore::merge(self, user_id, incoming).await
    }
}

impl std::fmt::Debug for LikesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LikesStore")
            .field("in_flight", &self.locks.in_flight())
            .finish()
    }
}
