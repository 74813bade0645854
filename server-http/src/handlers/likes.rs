use crate::api::ApiError;
use crate::middleware::CallerId;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use shared_http::api::{LikesResponse, MigrateLikesRequest, ToggleLikeRequest, ToggleLikeResponse};
use tracing::info;

/// GET /api/likes
pub async fn get_likes(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> Result<Json<LikesResponse>, ApiError> {
    let likes = state.likes.get(&user_id).await?;
    Ok(Json(LikesResponse { likes }))
}

/// POST /api/likes/toggle
pub async fn toggle_like(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    payload: Result<Json<ToggleLikeRequest>, JsonRejection>,
) -> Result<Json<ToggleLikeResponse>, ApiError> {
    let Json(req) = payload?;
    info!(
        "TOGGLE: user={}, category={}, record={}",
        user_id, req.category, req.record_id
    );

    let outcome = state
        .likes
        .toggle(&user_id, req.category, &req.record_id)
        .await?;

    Ok(Json(ToggleLikeResponse {
        liked: outcome.liked,
        likes: outcome.metadata,
    }))
}

/// POST /api/likes/migrate
pub async fn migrate_likes(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    payload: Result<Json<MigrateLikesRequest>, JsonRejection>,
) -> Result<Json<LikesResponse>, ApiError> {
    let Json(req) = payload?;
    if !req.is_merge() {
        return Err(ApiError::bad_request(format!(
            "Unsupported action '{}', expected '{}'",
            req.action,
            MigrateLikesRequest::MERGE
        )));
    }

    let incoming = req.likes();
    info!("MIGRATE: user={}, incoming={}", user_id, incoming.total());

    let likes = state.likes.merge(&user_id, incoming).await?;
    Ok(Json(LikesResponse { likes }))
}
