use crate::api::ApiError;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use engagement::UserId;
use shared_http::api::USER_ID_HEADER;

/// The caller's user id, taken from the `x-user-id` header. Identity is
/// resolved in front of this service, so the header is trusted as is.
#[derive(Debug, Clone)]
pub struct CallerId(pub UserId);

/// Extract the user id from the header, if present and non-blank
fn extract_user_id(parts: &Parts) -> Option<UserId> {
    let raw = parts.headers.get(USER_ID_HEADER)?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    Some(UserId::new(raw))
}

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_user_id(parts)
            .map(CallerId)
            .ok_or_else(|| ApiError::unauthorized(format!("Missing {} header", USER_ID_HEADER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/likes");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_extract_user_id() {
        assert_eq!(
            extract_user_id(&parts_with(Some(" user_42 "))).map(|u| u.to_string()),
            Some("user_42".to_string())
        );
        assert!(extract_user_id(&parts_with(Some("   "))).is_none());
        assert!(extract_user_id(&parts_with(None)).is_none());
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let mut parts = parts_with(None);
        let rejection = CallerId::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(rejection.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
