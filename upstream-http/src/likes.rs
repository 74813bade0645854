use crate::client::{UpstreamClient, read_error, status_error, write_error};
use async_trait::async_trait;
use engagement::ports::LikesBackend;
use engagement::{Category, LikesMetadata, ToggleOutcome, UserId};
use reqwest::{Method, StatusCode};
use shared::{Error, Result};
use shared_http::api::{
    ErrorResponse, LikesResponse, MigrateLikesRequest, ToggleLikeRequest, ToggleLikeResponse,
    USER_ID_HEADER,
};

/// Client for the likes endpoints of `server-http`, so that a coordinator can
/// run in a different process from the likes store.
#[derive(Clone, Debug)]
pub struct HttpLikesClient {
    client: UpstreamClient,
}

impl HttpLikesClient {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    pub async fn get(&self, user_id: &UserId) -> Result<LikesMetadata> {
        let response = self
            .client
            .request(Method::GET, &["api", "likes"])
            .header(USER_ID_HEADER, user_id.as_str())
            .send()
            .await
            .map_err(|e| read_error("get likes", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body("get likes", user_id, status, &body, false));
        }

        let body: LikesResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamReadFailed(format!("Failed to decode likes: {}", e)))?;
        Ok(body.likes)
    }
}

/// Rebuild the server's error from its `{error, message}` body, so that
/// `CONCURRENT_UPDATE` and `VALIDATION_REJECTED` survive the hop.
pub(crate) fn error_from_body(
    context: &str,
    user_id: &UserId,
    status: StatusCode,
    body: &str,
    writing: bool,
) -> Error {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) if err.error == "CONCURRENT_UPDATE" => Error::ConcurrentUpdate {
            user_id: user_id.to_string(),
        },
        Ok(err) if err.error == "VALIDATION_REJECTED" => Error::ValidationRejected(err.message),
        Ok(err) => status_error(context, status, &err.message, writing),
        Err(_) => status_error(context, status, body, writing),
    }
}

#[async_trait]
impl LikesBackend for HttpLikesClient {
    async fn toggle(
        &self,
        user_id: &UserId,
        category: Category,
        record_id: &str,
    ) -> Result<ToggleOutcome> {
        let response = self
            .client
            .request(Method::POST, &["api", "likes", "toggle"])
            .header(USER_ID_HEADER, user_id.as_str())
            .json(&ToggleLikeRequest {
                category,
                record_id: record_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| write_error("toggle like", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body("toggle like", user_id, status, &body, true));
        }

        let body: ToggleLikeResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamWriteFailed(format!("Failed to decode toggle: {}", e)))?;
        Ok(ToggleOutcome {
            liked: body.liked,
            metadata: body.likes,
        })
    }

    async fn merge(&self, user_id: &UserId, incoming: LikesMetadata) -> Result<LikesMetadata> {
        let response = self
            .client
            .request(Method::POST, &["api", "likes", "migrate"])
            .header(USER_ID_HEADER, user_id.as_str())
            .json(&MigrateLikesRequest::merge(&incoming))
            .send()
            .await
            .map_err(|e| write_error("merge likes", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body("merge likes", user_id, status, &body, true));
        }

        let body: LikesResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamWriteFailed(format!("Failed to decode merge: {}", e)))?;
        Ok(body.likes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_rebuilt() {
        let user = UserId::new("u1");

        let busy = r#"{"error":"CONCURRENT_UPDATE","message":"busy"}"#;
        assert_eq!(
            error_from_body("toggle like", &user, StatusCode::CONFLICT, busy, true),
            Error::ConcurrentUpdate {
                user_id: "u1".to_string()
            }
        );

        let invalid = r#"{"error":"VALIDATION_REJECTED","message":"record id must not be blank"}"#;
        assert_eq!(
            error_from_body("toggle like", &user, StatusCode::UNPROCESSABLE_ENTITY, invalid, true),
            Error::ValidationRejected("record id must not be blank".to_string())
        );

        let gateway = r#"{"error":"UPSTREAM_WRITE_FAILED","message":"identity provider down"}"#;
        assert!(matches!(
            error_from_body("toggle like", &user, StatusCode::BAD_GATEWAY, gateway, true),
            Error::UpstreamWriteFailed(ref m) if m.contains("identity provider down")
        ));

        assert!(matches!(
            error_from_body("get likes", &user, StatusCode::SERVICE_UNAVAILABLE, "<html>", false),
            Error::UpstreamReadFailed(_)
        ));
    }
}
