mod error;

pub use error::{status_for, ApiError};
