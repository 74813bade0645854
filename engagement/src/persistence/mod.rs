pub mod memory;
pub mod sled_store;

pub use memory::{InMemoryMigrationMarker, InMemoryUserObjectStore};
pub use sled_store::{SledMigrationMarker, SledUserObjectStore};
