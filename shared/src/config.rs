use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub data_dir: String,
    pub cache_ttl_ms: u64,
    pub cache_max_entries: usize,
    pub identity_api_url: Option<String>,
    pub identity_api_token: Option<String>,
    pub content_api_url: Option<String>,
    pub upstream_timeout_ms: u64,
    pub allowed_origins: Vec<String>,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8080;
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_CACHE_TTL_MS: u64 = 300_000; // 5 minutes
    const DEFAULT_CACHE_MAX_ENTRIES: usize = 200;
    const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 10_000;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("VERSE_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string()),
            http_port: parse_or(&lookup, "VERSE_HTTP_PORT", Self::DEFAULT_HTTP_PORT),
            data_dir: non_empty("VERSE_DATA_DIR")
                .unwrap_or_else(|| Self::DEFAULT_DATA_DIR.to_string()),
            cache_ttl_ms: parse_or(&lookup, "VERSE_CACHE_TTL_MS", Self::DEFAULT_CACHE_TTL_MS),
            cache_max_entries: parse_or(
                &lookup,
                "VERSE_CACHE_MAX_ENTRIES",
                Self::DEFAULT_CACHE_MAX_ENTRIES,
            ),
            identity_api_url: non_empty("VERSE_IDENTITY_API_URL"),
            identity_api_token: non_empty("VERSE_IDENTITY_API_TOKEN"),
            content_api_url: non_empty("VERSE_CONTENT_API_URL"),
            upstream_timeout_ms: parse_or(
                &lookup,
                "VERSE_UPSTREAM_TIMEOUT_MS",
                Self::DEFAULT_UPSTREAM_TIMEOUT_MS,
            ),
            allowed_origins: lookup("VERSE_ALLOWED_ORIGINS")
                .unwrap_or_else(|| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for Config {
    /// Same as an empty environment.
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, raw, default);
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.cache_ttl_ms, 300_000);
        assert_eq!(config.cache_max_entries, 200);
        assert!(config.identity_api_url.is_none());
        assert!(config.allows_any_origin());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("VERSE_HTTP_PORT", "9090"),
            ("VERSE_CACHE_MAX_ENTRIES", "16"),
            ("VERSE_IDENTITY_API_URL", "https://identity.example"),
            ("VERSE_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ]);
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.cache_max_entries, 16);
        assert_eq!(
            config.identity_api_url.as_deref(),
            Some("https://identity.example")
        );
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[("VERSE_HTTP_PORT", "not-a-port"), ("VERSE_CACHE_TTL_MS", "-5")]);
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.cache_ttl_ms, 300_000);
    }

    #[test]
    fn test_blank_url_is_none() {
        let config = config_from(&[("VERSE_CONTENT_API_URL", "  ")]);
        assert!(config.content_api_url.is_none());
    }
}
