use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Content kinds that can be liked. Closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ashaar,
    Ghazlen,
    Nazmen,
    Rubai,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Ashaar,
        Category::Ghazlen,
        Category::Nazmen,
        Category::Rubai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ashaar => "ashaar",
            Category::Ghazlen => "ghazlen",
            Category::Nazmen => "nazmen",
            Category::Rubai => "rubai",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// Identity of a user as issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Engagement counters carried by every record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementField {
    Likes,
    Comments,
    Shares,
}

impl EngagementField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementField::Likes => "likes",
            EngagementField::Comments => "comments",
            EngagementField::Shares => "shares",
        }
    }
}

/// A signed change to one counter of one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementDelta {
    pub record_id: String,
    pub field: EngagementField,
    pub amount: i64,
}

impl EngagementDelta {
    pub fn new(record_id: impl Into<String>, field: EngagementField, amount: i64) -> Self {
        Self {
            record_id: record_id.into(),
            field,
            amount,
        }
    }

    pub fn increment(record_id: impl Into<String>, field: EngagementField) -> Self {
        Self::new(record_id, field, 1)
    }

    pub fn decrement(record_id: impl Into<String>, field: EngagementField) -> Self {
        Self::new(record_id, field, -1)
    }

    /// The delta that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            record_id: self.record_id.clone(),
            field: self.field,
            amount: self.amount.saturating_neg(),
        }
    }
}

/// A record whose engagement counters can be read and replaced.
pub trait EngagementRecord: Clone + Send + Sync + 'static {
    fn record_id(&self) -> &str;
    fn set_record_id(&mut self, id: String);
    fn counter(&self, field: EngagementField) -> i64;
    fn set_counter(&mut self, field: EngagementField, value: i64);
}

/// A record as returned by the content API. Only `id` and the counters are
/// interpreted; everything else rides along untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    #[serde(default)]
    pub likes: i64,
    #[serde(default)]
    pub comments: i64,
    #[serde(default)]
    pub shares: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            likes: 0,
            comments: 0,
            shares: 0,
            fields: Map::new(),
        }
    }

    pub fn with_counts(mut self, likes: i64, comments: i64, shares: i64) -> Self {
        self.likes = likes;
        self.comments = comments;
        self.shares = shares;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

impl EngagementRecord for ContentRecord {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn set_record_id(&mut self, id: String) {
        self.id = id;
    }

    fn counter(&self, field: EngagementField) -> i64 {
        match field {
            EngagementField::Likes => self.likes,
            EngagementField::Comments => self.comments,
            EngagementField::Shares => self.shares,
        }
    }

    fn set_counter(&mut self, field: EngagementField, value: i64) {
        match field {
            EngagementField::Likes => self.likes = value,
            EngagementField::Comments => self.comments = value,
            EngagementField::Shares => self.shares = value,
        }
    }
}

/// One page of a server-ordered list. Records are shared so that untouched
/// records keep pointer identity across optimistic updates.
#[derive(Debug, Serialize, Deserialize)]
pub struct PagedListSnapshot<R> {
    pub records: Vec<Arc<R>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<String>,
}

impl<R> PagedListSnapshot<R> {
    pub fn new(records: Vec<R>, continuation: Option<String>) -> Self {
        Self {
            records: records.into_iter().map(Arc::new).collect(),
            continuation,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: EngagementRecord> PagedListSnapshot<R> {
    pub fn find(&self, record_id: &str) -> Option<&Arc<R>> {
        self.records.iter().find(|r| r.record_id() == record_id)
    }
}

// Manual impls: cloning a snapshot clones the Arcs, not the records.
impl<R> Clone for PagedListSnapshot<R> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            continuation: self.continuation.clone(),
        }
    }
}

impl<R: PartialEq> PartialEq for PagedListSnapshot<R> {
    fn eq(&self, other: &Self) -> bool {
        self.continuation == other.continuation && self.records == other.records
    }
}

/// A logical list query. Identical queries must produce identical cache keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
    pub endpoint: String,
    pub params: BTreeMap<String, String>,
    pub locale: String,
    pub category: Category,
}

impl ListQuery {
    pub fn new(endpoint: impl Into<String>, locale: impl Into<String>, category: Category) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            locale: locale.into(),
            category,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// `<endpoint>:<serialized params>:<locale>:<category>`, with the page
    /// index folded into the params.
    pub fn cache_key(&self, page_index: usize) -> String {
        let mut params = self.params.clone();
        params.insert("page".to_string(), page_index.to_string());
        // BTreeMap<String, String> always serializes.
        let serialized = serde_json::to_string(&params).unwrap_or_default();
        format!(
            "{}:{}:{}:{}",
            self.endpoint, serialized, self.locale, self.category
        )
    }

    /// Prefix shared by every page of this query's endpoint.
    pub fn endpoint_prefix(&self) -> String {
        format!("{}:", self.endpoint)
    }
}

/// Per-user liked ids, by category. Ids are kept in insertion order, oldest
/// first, so that capping drops the oldest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LikesMetadata(BTreeMap<Category, Vec<String>>);

impl LikesMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I, S>(mut self, category: Category, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(category)
            .or_default()
            .extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn ids(&self, category: Category) -> &[String] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, category: Category, record_id: &str) -> bool {
        self.ids(category).iter().any(|id| id == record_id)
    }

    pub fn categories(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.0.iter().map(|(c, ids)| (*c, ids.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Order-insensitive view, for comparing membership.
    pub fn as_sets(&self) -> BTreeMap<Category, BTreeSet<String>> {
        self.0
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(c, ids)| (*c, ids.iter().cloned().collect()))
            .collect()
    }

    pub(crate) fn entry_mut(&mut self, category: Category) -> &mut Vec<String> {
        self.0.entry(category).or_default()
    }

    pub(crate) fn into_inner(self) -> BTreeMap<Category, Vec<String>> {
        self.0
    }

    pub(crate) fn from_inner(inner: BTreeMap<Category, Vec<String>>) -> Self {
        Self(inner)
    }

    /// Parse likes out of an untrusted JSON value. Unknown categories and
    /// non-string ids are dropped rather than failing the whole read.
    pub fn from_json_lenient(value: &Value) -> Self {
        let mut likes = LikesMetadata::new();
        let Some(object) = value.as_object() else {
            if !value.is_null() {
                warn!("Ignoring likes metadata that is not an object");
            }
            return likes;
        };

        for (name, ids) in object {
            let Ok(category) = name.parse::<Category>() else {
                warn!("Ignoring likes for unknown category '{}'", name);
                continue;
            };
            let Some(ids) = ids.as_array() else {
                warn!("Ignoring likes for '{}': not an array", name);
                continue;
            };
            let entry = likes.entry_mut(category);
            entry.extend(ids.iter().filter_map(|id| id.as_str().map(str::to_string)));
        }

        likes
    }
}

/// The whole user object exchanged with the identity provider. Writes replace
/// the object, so every field read must be written back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserObject {
    pub user_id: UserId,
    #[serde(default)]
    pub public_metadata: Map<String, Value>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserObject {
    const LIKES_FIELD: &str = "likes";

    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            public_metadata: Map::new(),
            updated_at: None,
        }
    }

    pub fn likes(&self) -> LikesMetadata {
        self.public_metadata
            .get(Self::LIKES_FIELD)
            .map(LikesMetadata::from_json_lenient)
            .unwrap_or_default()
    }

    pub fn set_likes(&mut self, likes: &LikesMetadata) -> shared::Result<()> {
        let value = serde_json::to_value(likes)
            .map_err(|e| shared::Error::Serialization(e.to_string()))?;
        self.public_metadata
            .insert(Self::LIKES_FIELD.to_string(), value);
        Ok(())
    }
}

/// Result of flipping one like.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleOutcome {
    pub liked: bool,
    pub metadata: LikesMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!("ashaar".parse::<Category>(), Ok(Category::Ashaar));
        assert_eq!(" Ghazlen ".parse::<Category>(), Ok(Category::Ghazlen));
        assert!("poems".parse::<Category>().is_err());
        assert_eq!(Category::Rubai.to_string(), "rubai");
    }

    #[test]
    fn test_delta_inverse() {
        let delta = EngagementDelta::increment("r1", EngagementField::Likes);
        let inverse = delta.inverse();
        assert_eq!(inverse.amount, -1);
        assert_eq!(inverse.record_id, "r1");
        assert_eq!(inverse.inverse(), delta);
    }

    #[test]
    fn test_content_record_keeps_extra_fields() {
        let raw = json!({
            "id": "r1",
            "likes": 5,
            "title": "Dil-e-nadan",
            "poet": "Ghalib"
        });
        let record: ContentRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.likes, 5);
        assert_eq!(record.comments, 0);
        assert_eq!(record.fields.get("poet"), Some(&json!("Ghalib")));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["title"], json!("Dil-e-nadan"));
        assert_eq!(back["shares"], json!(0));
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = ListQuery::new("poems", "ur", Category::Ghazlen)
            .with_param("poet", "mir")
            .with_param("era", "classical");
        let b = ListQuery::new("poems", "ur", Category::Ghazlen)
            .with_param("era", "classical")
            .with_param("poet", "mir");

        assert_eq!(a.cache_key(0), b.cache_key(0));
        assert_ne!(a.cache_key(0), a.cache_key(1));
        assert_eq!(
            a.cache_key(2),
            r#"poems:{"era":"classical","page":"2","poet":"mir"}:ur:ghazlen"#
        );
        assert!(a.cache_key(2).starts_with(&a.endpoint_prefix()));
    }

    #[test]
    fn test_likes_metadata_json_shape() {
        let likes = LikesMetadata::new().with_ids(Category::Ashaar, ["x", "y"]);
        assert_eq!(serde_json::to_value(&likes).unwrap(), json!({"ashaar": ["x", "y"]}));
        assert!(likes.contains(Category::Ashaar, "x"));
        assert!(!likes.contains(Category::Nazmen, "x"));
        assert_eq!(likes.total(), 2);
    }

    #[test]
    fn test_lenient_parse_drops_garbage() {
        let raw = json!({
            "ashaar": ["a", 7, "b"],
            "unknown": ["z"],
            "nazmen": "not-a-list"
        });
        let likes = LikesMetadata::from_json_lenient(&raw);
        assert_eq!(likes.ids(Category::Ashaar), ["a", "b"]);
        assert!(likes.ids(Category::Nazmen).is_empty());
        assert_eq!(likes.total(), 2);
    }

    #[test]
    fn test_user_object_preserves_other_fields() {
        let mut user = UserObject::empty(UserId::new("u1"));
        user.public_metadata
            .insert("displayName".to_string(), json!("Faiz"));
        user.set_likes(&LikesMetadata::new().with_ids(Category::Rubai, ["r9"]))
            .unwrap();

        assert_eq!(user.likes().ids(Category::Rubai), ["r9"]);
        assert_eq!(user.public_metadata["displayName"], json!("Faiz"));
    }
}
