use crate::client::{UpstreamClient, read_error, status_error, write_error};
use async_trait::async_trait;
use engagement::ports::ContentApi;
use engagement::{EngagementDelta, EngagementRecord, ListQuery, PagedListSnapshot};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::{Error, Result};
use std::marker::PhantomData;

#[derive(Deserialize)]
struct ListResponse<R> {
    records: Vec<R>,
    #[serde(default)]
    continuation: Option<String>,
}

#[derive(Serialize)]
struct PatchCountersRequest<'a> {
    deltas: &'a [EngagementDelta],
}

/// The remote paginated record store.
///
/// - `GET {endpoint}?{params}&locale=&category=&cursor=` lists one page
/// - `PATCH records/{id}` adjusts counters
/// - `POST records/{id}/comments` creates a comment
pub struct HttpContentApi<R> {
    client: UpstreamClient,
    _record: PhantomData<fn() -> R>,
}

impl<R> HttpContentApi<R> {
    pub fn new(client: UpstreamClient) -> Self {
        Self {
            client,
            _record: PhantomData,
        }
    }
}

/// Query string for a list request, in a stable order.
pub(crate) fn list_params(query: &ListQuery, continuation: Option<&str>) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    params.push(("locale".to_string(), query.locale.clone()));
    params.push(("category".to_string(), query.category.to_string()));
    if let Some(cursor) = continuation {
        params.push(("cursor".to_string(), cursor.to_string()));
    }
    params
}

#[async_trait]
impl<R> ContentApi<R> for HttpContentApi<R>
where
    R: EngagementRecord + Serialize + DeserializeOwned,
{
    async fn list(
        &self,
        query: &ListQuery,
        continuation: Option<&str>,
    ) -> Result<PagedListSnapshot<R>> {
        let segments: Vec<&str> = query.endpoint.split('/').filter(|s| !s.is_empty()).collect();
        let response = self
            .client
            .request(Method::GET, &segments)
            .query(&list_params(query, continuation))
            .send()
            .await
            .map_err(|e| read_error("list records", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status_error("list records", status, &body, false) {
                // A missing list is a failed read here, not an absent record.
                Error::NotFound => Error::UpstreamReadFailed(format!(
                    "list '{}' not found",
                    query.endpoint
                )),
                other => other,
            });
        }

        let page: ListResponse<R> = response
            .json()
            .await
            .map_err(|e| Error::UpstreamReadFailed(format!("Failed to decode page: {}", e)))?;
        Ok(PagedListSnapshot::new(page.records, page.continuation))
    }

    async fn patch_counters(&self, record_id: &str, deltas: &[EngagementDelta]) -> Result<()> {
        let response = self
            .client
            .request(Method::PATCH, &["records", record_id])
            .json(&PatchCountersRequest { deltas })
            .send()
            .await
            .map_err(|e| write_error("patch counters", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("patch counters", status, &body, true));
        }
        Ok(())
    }

    async fn create_comment(&self, parent_id: &str, comment: &R) -> Result<R> {
        let response = self
            .client
            .request(Method::POST, &["records", parent_id, "comments"])
            .json(comment)
            .send()
            .await
            .map_err(|e| write_error("create comment", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("create comment", status, &body, true));
        }

        response
            .json()
            .await
            .map_err(|e| Error::UpstreamWriteFailed(format!("Failed to decode comment: {}", e)))
    }
}
