use crate::domain::{Category, LikesMetadata};
use shared::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Maximum ids kept per category. Oldest ids are dropped first.
pub const MAX_LIKES_PER_CATEGORY: usize = 500;

/// Longest record id accepted, in bytes.
pub const MAX_RECORD_ID_LEN: usize = 256;

/// Sanitize likes before they are persisted: ids are trimmed, blank ids
/// dropped, duplicates removed (first occurrence wins), and each category
/// capped to its most recent [`MAX_LIKES_PER_CATEGORY`] ids. Empty categories
/// are omitted.
///
/// Ids that cannot be stored (too long, control characters) are dropped with a
/// warning, so one bad id never blocks later writes for the same user.
pub fn validate_likes(metadata: LikesMetadata) -> Result<LikesMetadata> {
    let mut sanitized = BTreeMap::new();

    for (category, ids) in metadata.into_inner() {
        let ids = sanitize_ids(category, ids);
        if !ids.is_empty() {
            sanitized.insert(category, ids);
        }
    }

    let sanitized = LikesMetadata::from_inner(sanitized);
    check_invariants(&sanitized)?;
    Ok(sanitized)
}

/// Validate a single id before it is toggled.
pub fn validate_record_id(record_id: &str) -> Result<&str> {
    let trimmed = record_id.trim();
    if trimmed.is_empty() {
        return Err(Error::ValidationRejected(
            "record id must not be blank".to_string(),
        ));
    }
    check_id(trimmed)?;
    Ok(trimmed)
}

fn sanitize_ids(category: Category, ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    let mut kept = Vec::with_capacity(ids.len());

    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            continue;
        }
        if let Err(e) = check_id(id) {
            warn!("Dropping unstorable like in '{}': {}", category, e);
            continue;
        }
        if seen.insert(id.to_string()) {
            kept.push(id.to_string());
        }
    }

    if kept.len() > MAX_LIKES_PER_CATEGORY {
        let overflow = kept.len() - MAX_LIKES_PER_CATEGORY;
        kept.drain(..overflow);
    }

    kept
}

fn check_id(id: &str) -> Result<()> {
    if id.len() > MAX_RECORD_ID_LEN {
        return Err(Error::ValidationRejected(format!(
            "record id longer than {} bytes",
            MAX_RECORD_ID_LEN
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(Error::ValidationRejected(
            "record id contains control characters".to_string(),
        ));
    }
    Ok(())
}

fn check_invariants(metadata: &LikesMetadata) -> Result<()> {
    for (category, ids) in metadata.categories() {
        if ids.len() > MAX_LIKES_PER_CATEGORY {
            return Err(Error::ValidationRejected(format!(
                "'{}' holds {} ids, cap is {}",
                category,
                ids.len(),
                MAX_LIKES_PER_CATEGORY
            )));
        }
        let unique: HashSet<&String> = ids.iter().collect();
        if unique.len() != ids.len() {
            return Err(Error::ValidationRejected(format!(
                "'{}' contains duplicate ids",
                category
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_trim() {
        let likes = LikesMetadata::new().with_ids(Category::Ashaar, ["x", " y ", "x", "", "   ", "y"]);
        let validated = validate_likes(likes).unwrap();
        assert_eq!(validated.ids(Category::Ashaar), ["x", "y"]);
    }

    #[test]
    fn test_cap_drops_oldest() {
        let ids: Vec<String> = (0..MAX_LIKES_PER_CATEGORY + 20).map(|i| format!("id-{}", i)).collect();
        let likes = LikesMetadata::new().with_ids(Category::Ghazlen, ids);

        let validated = validate_likes(likes).unwrap();
        let kept = validated.ids(Category::Ghazlen);
        assert_eq!(kept.len(), MAX_LIKES_PER_CATEGORY);
        assert_eq!(kept.first().map(String::as_str), Some("id-20"));
        assert_eq!(
            kept.last().map(String::as_str),
            Some(format!("id-{}", MAX_LIKES_PER_CATEGORY + 19).as_str())
        );
    }

    #[test]
    fn test_empty_categories_are_dropped() {
        let likes = LikesMetadata::new()
            .with_ids(Category::Nazmen, Vec::<String>::new())
            .with_ids(Category::Rubai, ["  "]);
        let validated = validate_likes(likes).unwrap();
        assert!(validated.is_empty());
        assert_eq!(validated, LikesMetadata::new());
    }

    #[test]
    fn test_overlong_id_is_dropped() {
        let likes = LikesMetadata::new().with_ids(
            Category::Ashaar,
            ["good-1".to_string(), "a".repeat(MAX_RECORD_ID_LEN + 1), "good-2".to_string()],
        );
        let validated = validate_likes(likes).unwrap();
        assert_eq!(validated.ids(Category::Ashaar), ["good-1", "good-2"]);
    }

    #[test]
    fn test_control_characters_are_dropped() {
        let likes = LikesMetadata::new()
            .with_ids(Category::Ashaar, ["bad\u{7}id"])
            .with_ids(Category::Rubai, ["r1"]);
        let validated = validate_likes(likes).unwrap();
        assert!(validated.ids(Category::Ashaar).is_empty());
        assert_eq!(validated.ids(Category::Rubai), ["r1"]);
    }

    #[test]
    fn test_id_at_length_limit_is_kept() {
        let id = "b".repeat(MAX_RECORD_ID_LEN);
        let validated = validate_likes(LikesMetadata::new().with_ids(Category::Nazmen, [id.clone()])).unwrap();
        assert_eq!(validated.ids(Category::Nazmen), [id]);
    }

    #[test]
    fn test_validate_record_id() {
        assert_eq!(validate_record_id("  r1 ").unwrap(), "r1");
        assert!(validate_record_id("   ").is_err());
        assert!(validate_record_id(&"z".repeat(MAX_RECORD_ID_LEN + 1)).is_err());
    }
}
