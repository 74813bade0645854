//! Pure transformations of cached snapshots.
//!
//! Nothing here performs I/O or touches shared state. Records that a
//! transformation does not change are carried over as the same `Arc`, so
//! callers can detect changes with [`Arc::ptr_eq`].

use crate::domain::{EngagementDelta, EngagementField, EngagementRecord, PagedListSnapshot};
use std::sync::Arc;

/// Apply `delta` to the matching record of one page. Returns a clone of the
/// input when no record matches.
pub fn apply_delta_to_paged_list<R: EngagementRecord>(
    snapshot: &PagedListSnapshot<R>,
    delta: &EngagementDelta,
) -> PagedListSnapshot<R> {
    PagedListSnapshot {
        records: snapshot
            .records
            .iter()
            .map(|record| {
                if record.record_id() == delta.record_id {
                    Arc::new(apply_delta_to_record(record.as_ref(), delta))
                } else {
                    Arc::clone(record)
                }
            })
            .collect(),
        continuation: snapshot.continuation.clone(),
    }
}

/// Apply `delta` across every page currently held for a logical list.
pub fn apply_delta_to_pages<R: EngagementRecord>(
    pages: &[PagedListSnapshot<R>],
    delta: &EngagementDelta,
) -> Vec<PagedListSnapshot<R>> {
    pages
        .iter()
        .map(|page| apply_delta_to_paged_list(page, delta))
        .collect()
}

/// Single-record variant. A record with a different id is returned as is.
pub fn apply_delta_to_record<R: EngagementRecord>(record: &R, delta: &EngagementDelta) -> R {
    let mut updated = record.clone();
    if record.record_id() == delta.record_id {
        let current = record.counter(delta.field);
        updated.set_counter(delta.field, current.saturating_add(delta.amount));
    }
    updated
}

/// Set several counters to exact values, e.g. after a server-confirmed count.
pub fn apply_field_set<R: EngagementRecord>(
    record: &R,
    field_values: &[(EngagementField, i64)],
) -> R {
    let mut updated = record.clone();
    for (field, value) in field_values {
        updated.set_counter(*field, *value);
    }
    updated
}

/// [`apply_field_set`] on the matching record of a page.
pub fn apply_field_set_to_paged_list<R: EngagementRecord>(
    snapshot: &PagedListSnapshot<R>,
    record_id: &str,
    field_values: &[(EngagementField, i64)],
) -> PagedListSnapshot<R> {
    PagedListSnapshot {
        records: snapshot
            .records
            .iter()
            .map(|record| {
                if record.record_id() == record_id {
                    Arc::new(apply_field_set(record.as_ref(), field_values))
                } else {
                    Arc::clone(record)
                }
            })
            .collect(),
        continuation: snapshot.continuation.clone(),
    }
}

/// Insert a new item at the head of the list.
pub fn prepend_item<R>(list: &PagedListSnapshot<R>, item: R) -> PagedListSnapshot<R> {
    let mut records = Vec::with_capacity(list.records.len() + 1);
    records.push(Arc::new(item));
    records.extend(list.records.iter().cloned());

    PagedListSnapshot {
        records,
        continuation: list.continuation.clone(),
    }
}

/// Remove every item with `record_id`; the inverse of [`prepend_item`].
pub fn remove_item<R: EngagementRecord>(
    list: &PagedListSnapshot<R>,
    record_id: &str,
) -> PagedListSnapshot<R> {
    PagedListSnapshot {
        records: list
            .records
            .iter()
            .filter(|r| r.record_id() != record_id)
            .cloned()
            .collect(),
        continuation: list.continuation.clone(),
    }
}

/// Swap the item with `record_id` for `item`, in place.
pub fn replace_item<R: EngagementRecord>(
    list: &PagedListSnapshot<R>,
    record_id: &str,
    item: R,
) -> PagedListSnapshot<R> {
    let item = Arc::new(item);
    PagedListSnapshot {
        records: list
            .records
            .iter()
            .map(|r| {
                if r.record_id() == record_id {
                    Arc::clone(&item)
                } else {
                    Arc::clone(r)
                }
            })
            .collect(),
        continuation: list.continuation.clone(),
    }
}

/// Fold several deltas over a page, in order.
pub fn apply_batch<R: EngagementRecord>(
    snapshot: &PagedListSnapshot<R>,
    deltas: &[EngagementDelta],
) -> PagedListSnapshot<R> {
    deltas
        .iter()
        .fold(snapshot.clone(), |acc, delta| apply_delta_to_paged_list(&acc, delta))
}

/// Inverse of a batch: each delta inverted, applied in reverse order.
pub fn inverse_batch(deltas: &[EngagementDelta]) -> Vec<EngagementDelta> {
    deltas.iter().rev().map(EngagementDelta::inverse).collect()
}
