use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use shared::config::Config;
use shared::{Error, Result};
use std::time::Duration;
use tracing::warn;

/// Base URL, timeout and credentials for one upstream service.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl UpstreamClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Internal(format!("Invalid upstream URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Internal(format!(
                "Upstream URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            bearer_token: None,
        })
    }

    /// Client for the identity provider, when one is configured.
    pub fn identity_from_config(config: &Config) -> Result<Option<Self>> {
        config
            .identity_api_url
            .as_deref()
            .map(|url| {
                let client = Self::new(url, config.upstream_timeout())?;
                Ok(match &config.identity_api_token {
                    Some(token) => client.with_bearer_token(token.clone()),
                    None => client,
                })
            })
            .transpose()
    }

    /// Client for the content API, when one is configured.
    pub fn content_from_config(config: &Config) -> Result<Option<Self>> {
        config
            .content_api_url
            .as_deref()
            .map(|url| Self::new(url, config.upstream_timeout()))
            .transpose()
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Base URL with `segments` appended, each percent-encoded on its own.
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub(crate) fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.url(segments));
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

pub(crate) fn read_error(context: &str, e: reqwest::Error) -> Error {
    warn!("{} failed: {}", context, e);
    Error::UpstreamReadFailed(describe(context, &e))
}

pub(crate) fn write_error(context: &str, e: reqwest::Error) -> Error {
    warn!("{} failed: {}", context, e);
    Error::UpstreamWriteFailed(describe(context, &e))
}

fn describe(context: &str, e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("{} timed out", context)
    } else {
        format!("{}: {}", context, e)
    }
}

/// Error for a non-success status. `writing` selects the write or read
/// variant.
pub(crate) fn status_error(context: &str, status: StatusCode, body: &str, writing: bool) -> Error {
    let detail = body.trim();
    let message = if detail.is_empty() {
        format!("{} returned {}", context, status)
    } else {
        format!("{} returned {}: {}", context, status, detail)
    };

    if status == StatusCode::NOT_FOUND && !writing {
        return Error::NotFound;
    }
    if writing {
        Error::UpstreamWriteFailed(message)
    } else {
        Error::UpstreamReadFailed(message)
    }
}
