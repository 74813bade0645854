use crate::domain::UserId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::{Error, Result};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// One in-flight slot per user. Acquisition never waits: a busy slot is a
/// `ConcurrentUpdate` error.
///
/// The slot holds the completion signal of the operation that owns it and is
/// removed when the guard drops, whether the operation succeeded, failed, or
/// was cancelled.
#[derive(Debug, Default)]
pub struct UserLockTable {
    slots: DashMap<UserId, Arc<Notify>>,
}

impl UserLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, user_id: &UserId) -> Result<UserLockGuard<'_>> {
        match self.slots.entry(user_id.clone()) {
            Entry::Occupied(_) => {
                warn!("Rejected concurrent likes update for user '{}'", user_id);
                Err(Error::ConcurrentUpdate {
                    user_id: user_id.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Notify::new()));
                debug!("Acquired likes lock for user '{}'", user_id);
                Ok(UserLockGuard {
                    table: self,
                    user_id: user_id.clone(),
                })
            }
        }
    }

    pub fn is_locked(&self, user_id: &UserId) -> bool {
        self.slots.contains_key(user_id)
    }

    /// Number of users with an operation in flight.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Resolves once the operation currently holding `user_id` settles.
    /// Returns immediately when the slot is free.
    pub async fn wait_released(&self, user_id: &UserId) {
        let Some(signal) = self.slots.get(user_id).map(|slot| Arc::clone(slot.value())) else {
            return;
        };
        let released = signal.notified();

        // The slot may have been released between the lookup and creating
        // the future; only wait if the same operation still holds it.
        let still_held = self
            .slots
            .get(user_id)
            .is_some_and(|slot| Arc::ptr_eq(slot.value(), &signal));
        if still_held {
            released.await;
        }
    }

    fn release(&self, user_id: &UserId) {
        if let Some((_, signal)) = self.slots.remove(user_id) {
            signal.notify_waiters();
            debug!("Released likes lock for user '{}'", user_id);
        }
    }
}

/// Holds a user's slot; dropping it releases the slot.
#[derive(Debug)]
pub struct UserLockGuard<'a> {
    table: &'a UserLockTable,
    user_id: UserId,
}

impl UserLockGuard<'_> {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

impl Drop for UserLockGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.user_id);
    }
}
