use crate::domain::{UserId, UserObject};
use crate::ports::{MigrationMarker, UserObjectStore};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use shared::Result;

/// Process-local user objects. Used in tests and for ephemeral runs.
#[derive(Debug, Default)]
pub struct InMemoryUserObjectStore {
    users: DashMap<UserId, UserObject>,
}

impl InMemoryUserObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserObjectStore for InMemoryUserObjectStore {
    async fn read_user(&self, user_id: &UserId) -> Result<UserObject> {
        Ok(self
            .users
            .get(user_id)
            .map(|user| user.value().clone())
            .unwrap_or_else(|| UserObject::empty(user_id.clone())))
    }

    async fn write_user(&self, user: UserObject) -> Result<()> {
        self.users.insert(user.user_id.clone(), user);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMigrationMarker {
    migrated: DashSet<UserId>,
}

impl InMemoryMigrationMarker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MigrationMarker for InMemoryMigrationMarker {
    fn is_migrated(&self, user_id: &UserId) -> Result<bool> {
        Ok(self.migrated.contains(user_id))
    }

    fn mark_migrated(&self, user_id: &UserId) -> Result<()> {
        self.migrated.insert(user_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_user_reads_empty() {
        let store = InMemoryUserObjectStore::new();
        let user = store.read_user(&UserId::new("ghost")).await.unwrap();
        assert!(user.public_metadata.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_write_replaces_whole_object() {
        let store = InMemoryUserObjectStore::new();
        let mut user = UserObject::empty(UserId::new("u1"));
        user.public_metadata
            .insert("a".to_string(), serde_json::json!(1));
        store.write_user(user).await.unwrap();

        let replacement = UserObject::empty(UserId::new("u1"));
        store.write_user(replacement.clone()).await.unwrap();

        assert_eq!(store.read_user(&UserId::new("u1")).await.unwrap(), replacement);
        assert_eq!(store.len(), 1);
    }
}
