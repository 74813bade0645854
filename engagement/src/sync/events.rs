use crate::cache::current_timestamp_ms;
use serde::{Deserialize, Serialize};

/// Where an optimistic action stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    OptimisticApplied,
    Persisting,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Like,
    Share,
    Comment,
}

/// Published on every state transition of an action, for subscribers that
/// want to render pending/confirmed/failed markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub action: SyncAction,
    pub record_id: String,
    pub state: SyncState,
    pub slots_touched: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub timestamp: u64,
}

impl SyncEvent {
    pub fn new(action: SyncAction, record_id: impl Into<String>, state: SyncState) -> Self {
        Self {
            action,
            record_id: record_id.into(),
            state,
            slots_touched: 0,
            error_code: None,
            timestamp: current_timestamp_ms(),
        }
    }

    pub fn with_slots(mut self, slots_touched: usize) -> Self {
        self.slots_touched = slots_touched;
        self
    }

    pub fn with_error(mut self, error: &shared::Error) -> Self {
        self.error_code = Some(error.code().to_string());
        self
    }
}
