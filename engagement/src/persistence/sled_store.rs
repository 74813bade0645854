use crate::domain::{UserId, UserObject};
use crate::ports::{MigrationMarker, UserObjectStore};
use async_trait::async_trait;
use shared::{Error, Result};
use std::path::Path;

const USERS_TREE: &str = "users";
const MIGRATIONS_TREE: &str = "migrations";

fn open_db(path: impl AsRef<Path>) -> Result<sled::Db> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Internal(format!("Failed to create directory: {}", e)))?;
    }

    sled::open(path).map_err(|e| Error::Internal(format!("Failed to open Sled database: {}", e)))
}

/// Sled-backed user objects, for running without a remote identity provider.
#[derive(Clone)]
pub struct SledUserObjectStore {
    users: sled::Tree,
}

impl SledUserObjectStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_db(&open_db(path)?)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self> {
        let users = db
            .open_tree(USERS_TREE)
            .map_err(|e| Error::Internal(format!("Failed to open users tree: {}", e)))?;
        Ok(Self { users })
    }
}

#[async_trait]
impl UserObjectStore for SledUserObjectStore {
    async fn read_user(&self, user_id: &UserId) -> Result<UserObject> {
        let value = self
            .users
            .get(user_id.as_str().as_bytes())
            .map_err(|e| Error::UpstreamReadFailed(format!("Failed to get user: {}", e)))?;

        match value {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Serialization(format!("Failed to deserialize user: {}", e))),
            None => Ok(UserObject::empty(user_id.clone())),
        }
    }

    async fn write_user(&self, user: UserObject) -> Result<()> {
        let value = serde_json::to_vec(&user)
            .map_err(|e| Error::Serialization(format!("Failed to serialize user: {}", e)))?;

        self.users
            .insert(user.user_id.as_str().as_bytes(), value)
            .map_err(|e| Error::UpstreamWriteFailed(format!("Failed to save user: {}", e)))?;

        self.users
            .flush()
            .map_err(|e| Error::UpstreamWriteFailed(format!("Failed to flush database: {}", e)))?;

        Ok(())
    }
}

/// Remembers which users had their device-local likes merged.
#[derive(Clone)]
pub struct SledMigrationMarker {
    migrations: sled::Tree,
}

impl SledMigrationMarker {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_db(&open_db(path)?)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self> {
        let migrations = db
            .open_tree(MIGRATIONS_TREE)
            .map_err(|e| Error::Internal(format!("Failed to open migrations tree: {}", e)))?;
        Ok(Self { migrations })
    }
}

impl MigrationMarker for SledMigrationMarker {
    fn is_migrated(&self, user_id: &UserId) -> Result<bool> {
        self.migrations
            .contains_key(user_id.as_str().as_bytes())
            .map_err(|e| Error::Internal(format!("Failed to read migration marker: {}", e)))
    }

    fn mark_migrated(&self, user_id: &UserId) -> Result<()> {
        let stamp = chrono::Utc::now().to_rfc3339();
        self.migrations
            .insert(user_id.as_str().as_bytes(), stamp.as_bytes())
            .map_err(|e| Error::Internal(format!("Failed to save migration marker: {}", e)))?;

        self.migrations
            .flush()
            .map_err(|e| Error::Internal(format!("Failed to flush database: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, LikesMetadata};

    #[tokio::test]
    async fn test_sled_user_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("verse.sled");
        let store = SledUserObjectStore::new(&db_path).unwrap();
        let user_id = UserId::new("u1");

        let fresh = store.read_user(&user_id).await.unwrap();
        assert_eq!(fresh, UserObject::empty(user_id.clone()));

        let mut user = fresh;
        user.set_likes(&LikesMetadata::new().with_ids(Category::Ghazlen, ["g1"]))
            .unwrap();
        store.write_user(user.clone()).await.unwrap();

        assert_eq!(store.read_user(&user_id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_sled_user_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("verse.sled");
        let user_id = UserId::new("u1");

        {
            let store = SledUserObjectStore::new(&db_path).unwrap();
            let mut user = UserObject::empty(user_id.clone());
            user.set_likes(&LikesMetadata::new().with_ids(Category::Rubai, ["r1", "r2"]))
                .unwrap();
            store.write_user(user).await.unwrap();
        }

        let reopened = SledUserObjectStore::new(&db_path).unwrap();
        let user = reopened.read_user(&user_id).await.unwrap();
        assert_eq!(user.likes().ids(Category::Rubai), ["r1", "r2"]);
    }

    #[test]
    fn test_migration_marker() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = sled::open(temp_dir.path().join("verse.sled")).unwrap();

        // Both adapters can share one database
        let marker = SledMigrationMarker::from_db(&db).unwrap();
        let _users = SledUserObjectStore::from_db(&db).unwrap();

        let user_id = UserId::new("u1");
        assert!(!marker.is_migrated(&user_id).unwrap());
        marker.mark_migrated(&user_id).unwrap();
        assert!(marker.is_migrated(&user_id).unwrap());
        assert!(!marker.is_migrated(&UserId::new("u2")).unwrap());
    }
}
