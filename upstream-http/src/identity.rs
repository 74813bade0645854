use crate::client::{UpstreamClient, read_error, status_error, write_error};
use async_trait::async_trait;
use engagement::ports::UserObjectStore;
use engagement::{UserId, UserObject};
use reqwest::{Method, StatusCode};
use shared::{Error, Result};
use tracing::debug;

/// User objects held by the remote identity provider.
///
/// `GET users/{id}` and `PUT users/{id}`; the PUT replaces the whole object.
#[derive(Clone, Debug)]
pub struct HttpUserObjectStore {
    client: UpstreamClient,
}

impl HttpUserObjectStore {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UserObjectStore for HttpUserObjectStore {
    async fn read_user(&self, user_id: &UserId) -> Result<UserObject> {
        let response = self
            .client
            .request(Method::GET, &["users", user_id.as_str()])
            .send()
            .await
            .map_err(|e| read_error("read user", e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("User '{}' unknown upstream, starting empty", user_id);
            return Ok(UserObject::empty(user_id.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("read user", status, &body, false));
        }

        let mut user: UserObject = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("Failed to decode user object: {}", e)))?;
        // Writes go back under the id that was asked for.
        if user.user_id != *user_id {
            debug!(
                "Identity provider returned '{}' for '{}', keeping requested id",
                user.user_id, user_id
            );
            user.user_id = user_id.clone();
        }
        Ok(user)
    }

    async fn write_user(&self, user: UserObject) -> Result<()> {
        let response = self
            .client
            .request(Method::PUT, &["users", user.user_id.as_str()])
            .json(&user)
            .send()
            .await
            .map_err(|e| write_error("write user", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("write user", status, &body, true));
        }
        Ok(())
    }
}
