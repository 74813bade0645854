use engagement::{Category, LikesMetadata};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for `POST /api/likes/toggle`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleLikeRequest {
    pub category: Category,
    pub record_id: String,
}

/// Request body for `POST /api/likes/migrate`
///
/// `likes` comes from device-local storage, so it is kept raw and parsed
/// leniently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrateLikesRequest {
    pub action: String,
    #[serde(default)]
    pub likes: Value,
}

impl MigrateLikesRequest {
    pub const MERGE: &str = "merge";

    pub fn merge(likes: &LikesMetadata) -> Self {
        Self {
            action: Self::MERGE.to_string(),
            likes: serde_json::to_value(likes).unwrap_or_default(),
        }
    }

    pub fn is_merge(&self) -> bool {
        self.action == Self::MERGE
    }

    pub fn likes(&self) -> LikesMetadata {
        LikesMetadata::from_json_lenient(&self.likes)
    }
}
