pub mod lock;
pub mod store;
pub mod validation;

pub use lock::{UserLockGuard, UserLockTable};
pub use store::{LikesStore, is_liked, union_likes};
pub use validation::{MAX_LIKES_PER_CATEGORY, MAX_RECORD_ID_LEN, validate_likes, validate_record_id};
