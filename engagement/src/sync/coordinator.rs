use super::events::{SyncAction, SyncEvent, SyncState};
use crate::cache::{KeyPattern, SessionCache};
use crate::domain::{
    Category, EngagementDelta, EngagementField, EngagementRecord, ListQuery, PagedListSnapshot,
    ToggleOutcome, UserId,
};
use crate::mutation::{
    apply_delta_to_paged_list, apply_field_set_to_paged_list, prepend_item, remove_item,
    replace_item,
};
use crate::ports::{ContentApi, LikesBackend};
use shared::{Error, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of an optimistic action. Failures are reported here, after the
/// cache has been restored, rather than as an `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T> {
    Committed { value: T, slots_touched: usize },
    RolledBack { error: Error, slots_touched: usize },
}

impl<T> ActionOutcome<T> {
    pub fn is_committed(&self) -> bool {
        matches!(self, ActionOutcome::Committed { .. })
    }

    pub fn slots_touched(&self) -> usize {
        match self {
            ActionOutcome::Committed { slots_touched, .. }
            | ActionOutcome::RolledBack { slots_touched, .. } => *slots_touched,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            ActionOutcome::Committed { .. } => None,
            ActionOutcome::RolledBack { error, .. } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            ActionOutcome::Committed { value, .. } => Ok(value),
            ActionOutcome::RolledBack { error, .. } => Err(error),
        }
    }
}

/// A like or unlike issued from the UI. `cache_keys` names every cached page
/// that may show the record.
#[derive(Debug, Clone)]
pub struct LikeAction {
    pub user_id: UserId,
    pub category: Category,
    pub record_id: String,
    pub currently_liked: bool,
    pub cache_keys: Vec<String>,
}

/// Ties the session cache, the mutation engine and the remote collaborators
/// together: apply optimistically, persist, then commit or roll back.
pub struct SyncCoordinator<R: EngagementRecord> {
    cache: Arc<SessionCache<PagedListSnapshot<R>>>,
    likes: Arc<dyn LikesBackend>,
    content: Arc<dyn ContentApi<R>>,
    event_broadcaster: Option<broadcast::Sender<SyncEvent>>,
}

impl<R: EngagementRecord> SyncCoordinator<R> {
    pub fn new(
        cache: Arc<SessionCache<PagedListSnapshot<R>>>,
        likes: Arc<dyn LikesBackend>,
        content: Arc<dyn ContentApi<R>>,
    ) -> Self {
        Self {
            cache,
            likes,
            content,
            event_broadcaster: None,
        }
    }

    pub fn with_event_broadcaster(
        cache: Arc<SessionCache<PagedListSnapshot<R>>>,
        likes: Arc<dyn LikesBackend>,
        content: Arc<dyn ContentApi<R>>,
        broadcaster: broadcast::Sender<SyncEvent>,
    ) -> Self {
        Self {
            cache,
            likes,
            content,
            event_broadcaster: Some(broadcaster),
        }
    }

    pub fn cache(&self) -> &Arc<SessionCache<PagedListSnapshot<R>>> {
        &self.cache
    }

    /// One page of `query`. A fresh cached copy wins; otherwise the page is
    /// fetched and cached. When the fetch fails, an expired copy is served
    /// if one is still held.
    pub async fn fetch_page(
        &self,
        query: &ListQuery,
        page_index: usize,
        continuation: Option<&str>,
    ) -> Result<PagedListSnapshot<R>> {
        let key = query.cache_key(page_index);
        // `get` drops an expired copy, which is still wanted as a fallback.
        if self.cache.has(&key) {
            if let Some(page) = self.cache.get(&key) {
                debug!("Cache hit for '{}'", key);
                return Ok(page);
            }
        }

        match self.content.list(query, continuation).await {
            Ok(page) => {
                self.cache.set(key, page.clone(), None);
                Ok(page)
            }
            Err(e) => match self.cache.get_stale(&key) {
                Some(stale) => {
                    warn!("Serving stale copy of '{}' after failed fetch: {}", key, e);
                    Ok(stale)
                }
                None => Err(match e {
                    Error::UpstreamReadFailed(_) => e,
                    other => Error::UpstreamReadFailed(other.to_string()),
                }),
            },
        }
    }

    /// Drop every cached page of the query's endpoint.
    pub fn invalidate_query(&self, query: &ListQuery) -> usize {
        self.cache
            .invalidate(Some(&KeyPattern::prefix(query.endpoint_prefix())))
    }

    pub async fn toggle_like(&self, action: LikeAction) -> ActionOutcome<ToggleOutcome> {
        let LikeAction {
            user_id,
            category,
            record_id,
            currently_liked,
            cache_keys,
        } = action;

        let forward = like_delta(&record_id, !currently_liked);
        let touched = self.apply_delta(&cache_keys, &forward);
        self.emit(SyncAction::Like, &record_id, SyncState::OptimisticApplied, touched.len(), None);

        self.emit(SyncAction::Like, &record_id, SyncState::Persisting, touched.len(), None);
        let outcome = match self.likes.toggle(&user_id, category, &record_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.apply_delta(&touched, &forward.inverse());
                return self.rolled_back(SyncAction::Like, &record_id, touched.len(), e);
            }
        };

        // The cache follows the transition the store actually made.
        let actual = like_delta(&record_id, outcome.liked);
        if actual != forward {
            debug!(
                "Correcting optimistic like on '{}': store reports liked={}",
                record_id, outcome.liked
            );
            let correction = EngagementDelta::new(
                record_id.as_str(),
                EngagementField::Likes,
                actual.amount - forward.amount,
            );
            self.apply_delta(&touched, &correction);
        }

        if let Err(e) = self
            .content
            .patch_counters(&record_id, std::slice::from_ref(&actual))
            .await
        {
            self.apply_delta(&touched, &actual.inverse());
            if let Err(undo) = self.likes.toggle(&user_id, category, &record_id).await {
                error!(
                    "Failed to undo like toggle of '{}' for user '{}': {}",
                    record_id, user_id, undo
                );
            }
            return self.rolled_back(SyncAction::Like, &record_id, touched.len(), e);
        }

        info!(
            "User '{}' {} '{}' ({} cached slot(s))",
            user_id,
            if outcome.liked { "liked" } else { "unliked" },
            record_id,
            touched.len()
        );
        self.emit(SyncAction::Like, &record_id, SyncState::Committed, touched.len(), None);
        ActionOutcome::Committed {
            value: outcome,
            slots_touched: touched.len(),
        }
    }

    pub async fn record_share(&self, record_id: &str, cache_keys: &[String]) -> ActionOutcome<()> {
        let forward = EngagementDelta::increment(record_id, EngagementField::Shares);
        let touched = self.apply_delta(cache_keys, &forward);
        self.emit(SyncAction::Share, record_id, SyncState::OptimisticApplied, touched.len(), None);

        self.emit(SyncAction::Share, record_id, SyncState::Persisting, touched.len(), None);
        if let Err(e) = self
            .content
            .patch_counters(record_id, std::slice::from_ref(&forward))
            .await
        {
            self.apply_delta(&touched, &forward.inverse());
            return self.rolled_back(SyncAction::Share, record_id, touched.len(), e);
        }

        info!("Recorded share of '{}'", record_id);
        self.emit(SyncAction::Share, record_id, SyncState::Committed, touched.len(), None);
        ActionOutcome::Committed {
            value: (),
            slots_touched: touched.len(),
        }
    }

    /// Show `comment` at the head of `list_key` straight away under a
    /// provisional id, and bump the parent's comment count in `counter_keys`.
    /// On success the provisional item is swapped for the stored copy.
    pub async fn post_comment(
        &self,
        parent_id: &str,
        mut comment: R,
        list_key: &str,
        counter_keys: &[String],
    ) -> ActionOutcome<R> {
        let provisional_id = format!("provisional-{}", Uuid::new_v4());
        comment.set_record_id(provisional_id.clone());

        let listed = self
            .cache
            .update(list_key, |list| prepend_item(list, comment.clone()));
        let forward = EngagementDelta::increment(parent_id, EngagementField::Comments);
        let touched = self.apply_delta(counter_keys, &forward);
        let slots = touched.len() + usize::from(listed);
        self.emit(SyncAction::Comment, parent_id, SyncState::OptimisticApplied, slots, None);

        self.emit(SyncAction::Comment, parent_id, SyncState::Persisting, slots, None);
        match self.content.create_comment(parent_id, &comment).await {
            Ok(stored) => {
                if listed {
                    self.cache.update(list_key, |list| {
                        replace_item(list, &provisional_id, stored.clone())
                    });
                }
                info!("Posted comment '{}' under '{}'", stored.record_id(), parent_id);
                self.emit(SyncAction::Comment, parent_id, SyncState::Committed, slots, None);
                ActionOutcome::Committed {
                    value: stored,
                    slots_touched: slots,
                }
            }
            Err(e) => {
                if listed {
                    self.cache
                        .update(list_key, |list| remove_item(list, &provisional_id));
                }
                self.apply_delta(&touched, &forward.inverse());
                self.rolled_back(SyncAction::Comment, parent_id, slots, e)
            }
        }
    }

    /// Overwrite counters with server-confirmed values. Returns the number of
    /// slots updated.
    pub fn confirm_counts(
        &self,
        record_id: &str,
        field_values: &[(EngagementField, i64)],
        cache_keys: &[String],
    ) -> usize {
        cache_keys
            .iter()
            .filter(|key| {
                self.cache.update(key, |page| {
                    apply_field_set_to_paged_list(page, record_id, field_values)
                })
            })
            .count()
    }

    /// Apply `delta` to each fresh slot; returns the keys that were updated.
    /// Slots that expired meanwhile are skipped without complaint.
    fn apply_delta(&self, keys: &[String], delta: &EngagementDelta) -> Vec<String> {
        keys.iter()
            .filter(|key| {
                let updated = self
                    .cache
                    .update(key, |page| apply_delta_to_paged_list(page, delta));
                if !updated {
                    debug!("Skipped delta on '{}': slot absent or expired", key);
                }
                updated
            })
            .cloned()
            .collect()
    }

    fn rolled_back<T>(
        &self,
        action: SyncAction,
        record_id: &str,
        slots_touched: usize,
        error: Error,
    ) -> ActionOutcome<T> {
        warn!(
            "Rolled back {:?} on '{}' ({} slot(s)): {}",
            action, record_id, slots_touched, error
        );
        self.emit(action, record_id, SyncState::RolledBack, slots_touched, Some(&error));
        ActionOutcome::RolledBack {
            error,
            slots_touched,
        }
    }

    fn emit(
        &self,
        action: SyncAction,
        record_id: &str,
        state: SyncState,
        slots_touched: usize,
        error: Option<&Error>,
    ) {
        let Some(ref broadcaster) = self.event_broadcaster else {
            return;
        };

        let mut event = SyncEvent::new(action, record_id, state).with_slots(slots_touched);
        if let Some(error) = error {
            event = event.with_error(error);
        }

        match broadcaster.send(event) {
            Ok(receivers) => debug!(
                "Broadcasted {:?} event for '{}' to {} subscriber(s)",
                state, record_id, receivers
            ),
            Err(_) => debug!("No subscribers for {:?} event on '{}'", state, record_id),
        }
    }
}

fn like_delta(record_id: &str, liked: bool) -> EngagementDelta {
    if liked {
        EngagementDelta::increment(record_id, EngagementField::Likes)
    } else {
        EngagementDelta::decrement(record_id, EngagementField::Likes)
    }
}

impl<R: EngagementRecord> std::fmt::Debug for SyncCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("cache", &self.cache)
            .field("broadcasting", &self.event_broadcaster.is_some())
            .finish()
    }
}
