pub mod coordinator;
pub mod events;
pub mod migration;

pub use coordinator::{ActionOutcome, LikeAction, SyncCoordinator};
pub use events::{SyncAction, SyncEvent, SyncState};
pub use migration::{MigrationOutcome, migrate_local_likes};
