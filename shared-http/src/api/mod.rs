mod requests;
mod responses;

pub use requests::{MigrateLikesRequest, ToggleLikeRequest};
pub use responses::{ErrorResponse, HealthResponse, LikesResponse, ToggleLikeResponse};

/// Header carrying the caller's identity. Resolving it is upstream's job.
pub const USER_ID_HEADER: &str = "x-user-id";
