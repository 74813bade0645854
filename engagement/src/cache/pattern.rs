use regex::Regex;
use shared::{Error, Result};

/// Selects cache keys for bulk invalidation.
#[derive(Clone, Debug)]
pub enum KeyPattern {
    Prefix(String),
    Contains(String),
    Regex(Regex),
}

impl KeyPattern {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    pub fn contains(fragment: impl Into<String>) -> Self {
        KeyPattern::Contains(fragment.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(KeyPattern::Regex)
            .map_err(|e| Error::Internal(format!("invalid key pattern '{}': {}", pattern, e)))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPattern::Contains(fragment) => key.contains(fragment.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}
