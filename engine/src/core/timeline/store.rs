//! Entity Stores
//!
//! Ordered, id-keyed collections of timeline entities (captions, B-roll
//! clips, transitions). Each store exclusively owns its entities.
//!
//! The collection lives behind an `Arc`; every mutation goes through
//! `Arc::make_mut`, so a snapshot taken before an edit never observes a
//! partially applied change.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{is_valid_time_sec, new_id, CoreError, CoreResult, TimeSec};

// =============================================================================
// Entity Contract
// =============================================================================

/// Ordering policy of a store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOrder {
    /// Kept sorted by start time (stable for equal starts)
    ByStart,
    /// Kept in insertion order (z-order for overlays)
    Insertion,
}

/// A field change that was refused during an update
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRejection {
    pub field: &'static str,
    pub message: String,
}

impl FieldRejection {
    pub fn from_error(field: &'static str, error: &CoreError) -> Self {
        let field = match error {
            CoreError::ValidationError { field, .. } => *field,
            _ => field,
        };
        let message = match error {
            CoreError::ValidationError { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self { field, message }
    }
}

/// Result of applying a patch to one entity
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchOutcome {
    /// Fields that were changed
    pub changed: Vec<&'static str>,
    /// Fields that were refused, with the reason
    pub rejected: Vec<FieldRejection>,
    /// Whether the start time moved (store must re-sort)
    pub timing_changed: bool,
}

impl PatchOutcome {
    pub(crate) fn accept(&mut self, field: &'static str) {
        self.changed.push(field);
    }

    pub(crate) fn reject(&mut self, field: &'static str, error: CoreError) {
        self.rejected.push(FieldRejection::from_error(field, &error));
    }

    /// Records the result of validating a single field
    pub(crate) fn record<T>(
        &mut self,
        field: &'static str,
        result: CoreResult<T>,
        apply: impl FnOnce(T),
    ) {
        match result {
            Ok(value) => {
                apply(value);
                self.accept(field);
            }
            Err(e) => self.reject(field, e),
        }
    }
}

/// Contract shared by everything kept in an [`EntityStore`]
pub trait TimelineEntity: Clone + Send + Sync + 'static {
    /// Partial update accepted by [`EntityStore::update`]
    type Patch;

    /// Name used in logs and errors
    const KIND: &'static str;

    /// Ordering the store maintains
    const ORDER: StoreOrder;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn start_time(&self) -> TimeSec;

    /// Clamps the entity to `[0, video_duration]` and validates every field.
    ///
    /// On error the entity must not be inserted.
    fn normalize(&mut self, video_duration: TimeSec) -> CoreResult<()>;

    /// Merges `patch` field by field. Invalid fields are rejected and the
    /// rest of the entity stays as it was.
    fn apply_patch(&mut self, patch: Self::Patch, video_duration: TimeSec) -> PatchOutcome;
}

// =============================================================================
// Update Report
// =============================================================================

/// Outcome of [`EntityStore::update`].
///
/// An unknown id is not an error: the update is skipped and `found` is false.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    pub found: bool,
    pub changed: Vec<&'static str>,
    pub rejected: Vec<FieldRejection>,
}

impl UpdateReport {
    fn not_found() -> Self {
        Self::default()
    }

    /// Returns true when every requested field was applied
    pub fn is_clean(&self) -> bool {
        self.found && self.rejected.is_empty()
    }

    /// User-facing summary of rejected fields, if any
    pub fn rejection_message(&self) -> Option<String> {
        if self.rejected.is_empty() {
            return None;
        }
        Some(
            self.rejected
                .iter()
                .map(|r| format!("{}: {}", r.field, r.message))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

// =============================================================================
// Time Range Validation
// =============================================================================

/// Validates a `[start, end]` interval and clamps it to the video bounds.
pub fn clamp_interval(
    start: TimeSec,
    end: TimeSec,
    video_duration: TimeSec,
) -> CoreResult<(TimeSec, TimeSec)> {
    if !start.is_finite() {
        return Err(CoreError::invalid("startTime", "must be a finite number"));
    }
    if !end.is_finite() {
        return Err(CoreError::invalid("endTime", "must be a finite number"));
    }

    let start = start.clamp(0.0, video_duration);
    let end = end.clamp(0.0, video_duration);
    if start >= end {
        return Err(CoreError::InvalidTimeRange(start, end));
    }
    Ok((start, end))
}

/// Applies an optional start/end change as one timing edit.
///
/// Missing ends keep their current value. Returns the new interval when it
/// was accepted; on failure every provided field is rejected.
pub(crate) fn patch_interval(
    outcome: &mut PatchOutcome,
    current: (TimeSec, TimeSec),
    start: Option<TimeSec>,
    end: Option<TimeSec>,
    video_duration: TimeSec,
) -> Option<(TimeSec, TimeSec)> {
    if start.is_none() && end.is_none() {
        return None;
    }

    let requested = (start.unwrap_or(current.0), end.unwrap_or(current.1));
    match clamp_interval(requested.0, requested.1, video_duration) {
        Ok(interval) => {
            outcome.timing_changed = interval.0 != current.0;
            if start.is_some() {
                outcome.accept("startTime");
            }
            if end.is_some() {
                outcome.accept("endTime");
            }
            Some(interval)
        }
        Err(e) => {
            let message = e.to_string();
            if start.is_some() {
                outcome.rejected.push(FieldRejection {
                    field: "startTime",
                    message: message.clone(),
                });
            }
            if end.is_some() {
                outcome.rejected.push(FieldRejection {
                    field: "endTime",
                    message,
                });
            }
            None
        }
    }
}

/// Validates a non-negative, finite number of seconds
pub fn non_negative_seconds(field: &'static str, value: f64) -> CoreResult<f64> {
    if !is_valid_time_sec(value) {
        return Err(CoreError::invalid(
            field,
            format!("must be a finite number >= 0, got {value}"),
        ));
    }
    Ok(value)
}

// =============================================================================
// Entity Store
// =============================================================================

/// Ordered collection of one entity type
#[derive(Clone, Debug)]
pub struct EntityStore<T> {
    items: Arc<Vec<T>>,
    video_duration: TimeSec,
}

impl<T: TimelineEntity> EntityStore<T> {
    /// Creates an empty store bound to a video of the given duration
    pub fn new(video_duration: TimeSec) -> Self {
        Self {
            items: Arc::new(Vec::new()),
            video_duration,
        }
    }

    /// Duration entities are clamped to
    pub fn video_duration(&self) -> TimeSec {
        self.video_duration
    }

    /// Adds an entity, assigning an id if it has none.
    ///
    /// Returns the id of the stored entity.
    pub fn add(&mut self, mut entity: T) -> CoreResult<String> {
        entity.normalize(self.video_duration)?;

        if entity.id().trim().is_empty() {
            entity.set_id(new_id());
        } else if self.contains(entity.id()) {
            return Err(CoreError::invalid(
                "id",
                format!("{} {} already exists", T::KIND, entity.id()),
            ));
        }

        let id = entity.id().to_string();
        Arc::make_mut(&mut self.items).push(entity);
        self.sort();

        debug!(kind = T::KIND, id = %id, "Entity added");
        Ok(id)
    }

    /// Merges a partial update into the entity with the given id.
    ///
    /// Unknown ids are skipped silently (`found == false`).
    pub fn update(&mut self, id: &str, patch: T::Patch) -> UpdateReport {
        let Some(pos) = self.position(id) else {
            debug!(kind = T::KIND, id, "Update skipped: unknown id");
            return UpdateReport::not_found();
        };

        let video_duration = self.video_duration;
        let items = Arc::make_mut(&mut self.items);
        let outcome = items[pos].apply_patch(patch, video_duration);

        for rejection in &outcome.rejected {
            warn!(
                kind = T::KIND,
                id,
                field = rejection.field,
                "Rejected field change: {}",
                rejection.message
            );
        }

        if outcome.timing_changed {
            self.sort();
        }

        UpdateReport {
            found: true,
            changed: outcome.changed,
            rejected: outcome.rejected,
        }
    }

    /// Removes an entity by id. Unknown ids return `None`.
    pub fn remove(&mut self, id: &str) -> Option<T> {
        let pos = self.position(id)?;
        let removed = Arc::make_mut(&mut self.items).remove(pos);
        debug!(kind = T::KIND, id, "Entity removed");
        Some(removed)
    }

    /// Moves an entity to `index` (clamped to the end of the list).
    ///
    /// Only insertion-ordered stores can be reordered; a start-sorted
    /// entity's position follows from its timing. Unknown ids return false.
    pub fn move_to(&mut self, id: &str, index: usize) -> CoreResult<bool> {
        if T::ORDER != StoreOrder::Insertion {
            return Err(CoreError::invalid(
                "order",
                format!("{} order follows start time", T::KIND),
            ));
        }
        let Some(from) = self.position(id) else {
            debug!(kind = T::KIND, id, "Move skipped: unknown id");
            return Ok(false);
        };

        let items = Arc::make_mut(&mut self.items);
        let entity = items.remove(from);
        let to = index.min(items.len());
        items.insert(to, entity);

        debug!(kind = T::KIND, id, from, to, "Entity moved");
        Ok(true)
    }

    /// Gets an entity by id
    pub fn find(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|e| e.id() == id)
    }

    /// Returns true if an entity with the id exists
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Returns an owned copy of the entities in store order
    pub fn list(&self) -> Vec<T> {
        self.items.as_ref().clone()
    }

    /// Returns a shared, immutable snapshot of the entities in store order
    pub fn snapshot(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.items)
    }

    /// Borrows the entities in store order
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replaces the whole collection in one swap.
    ///
    /// Every entity is normalized first; if any fails nothing changes.
    pub fn replace_all(&mut self, entities: Vec<T>) -> CoreResult<usize> {
        let mut next = Vec::with_capacity(entities.len());
        for mut entity in entities {
            entity.normalize(self.video_duration)?;
            if entity.id().trim().is_empty() {
                entity.set_id(new_id());
            }
            if next.iter().any(|e: &T| e.id() == entity.id()) {
                return Err(CoreError::invalid(
                    "id",
                    format!("duplicate {} id {}", T::KIND, entity.id()),
                ));
            }
            next.push(entity);
        }

        let count = next.len();
        self.items = Arc::new(next);
        self.sort();
        debug!(kind = T::KIND, count, "Store replaced");
        Ok(count)
    }

    /// Removes every entity
    pub fn clear(&mut self) {
        self.items = Arc::new(Vec::new());
    }

    /// Applies a non-timing edit to every entity
    pub(crate) fn for_each_mut(&mut self, mut edit: impl FnMut(&mut T)) {
        for entity in Arc::make_mut(&mut self.items).iter_mut() {
            edit(entity);
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    fn sort(&mut self) {
        if T::ORDER == StoreOrder::ByStart {
            Arc::make_mut(&mut self.items)
                .sort_by(|a, b| a.start_time().total_cmp(&b.start_time()));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal entity for exercising store mechanics
    #[derive(Clone, Debug, PartialEq)]
    struct Marker {
        id: String,
        at: TimeSec,
        label: String,
    }

    struct MarkerPatch {
        at: Option<TimeSec>,
        label: Option<String>,
    }

    impl TimelineEntity for Marker {
        type Patch = MarkerPatch;
        const KIND: &'static str = "marker";
        const ORDER: StoreOrder = StoreOrder::ByStart;

        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn start_time(&self) -> TimeSec {
            self.at
        }

        fn normalize(&mut self, video_duration: TimeSec) -> CoreResult<()> {
            if !self.at.is_finite() {
                return Err(CoreError::invalid("at", "must be finite"));
            }
            self.at = self.at.clamp(0.0, video_duration);
            Ok(())
        }

        fn apply_patch(&mut self, patch: MarkerPatch, _video_duration: TimeSec) -> PatchOutcome {
            let mut outcome = PatchOutcome::default();
            if let Some(at) = patch.at {
                let result = non_negative_seconds("at", at);
                outcome.record("at", result, |v| self.at = v);
                outcome.timing_changed = outcome.rejected.is_empty();
            }
            if let Some(label) = patch.label {
                self.label = label;
                outcome.accept("label");
            }
            outcome
        }
    }

    fn marker(id: &str, at: TimeSec) -> Marker {
        Marker {
            id: id.to_string(),
            at,
            label: id.to_uppercase(),
        }
    }

    #[test]
    fn test_add_assigns_id_and_sorts() {
        let mut store = EntityStore::new(10.0);
        store.add(marker("b", 5.0)).unwrap();
        let generated = store.add(marker("", 1.0)).unwrap();

        assert!(!generated.is_empty());
        assert_eq!(store.as_slice()[0].id, generated);
        assert_eq!(store.as_slice()[1].id, "b");
    }

    #[test]
    fn test_add_rejects_duplicate_id() {
        let mut store = EntityStore::new(10.0);
        store.add(marker("a", 1.0)).unwrap();
        assert!(store.add(marker("a", 2.0)).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let mut store = EntityStore::new(10.0);
        store.add(marker("a", 1.0)).unwrap();
        let before = store.list();

        let report = store.update(
            "missing",
            MarkerPatch {
                at: Some(3.0),
                label: None,
            },
        );

        assert!(!report.found);
        assert_eq!(store.list(), before);
    }

    #[test]
    fn test_update_resorts_on_timing_change() {
        let mut store = EntityStore::new(10.0);
        store.add(marker("a", 1.0)).unwrap();
        store.add(marker("b", 2.0)).unwrap();

        let report = store.update(
            "a",
            MarkerPatch {
                at: Some(9.0),
                label: None,
            },
        );

        assert!(report.is_clean());
        assert_eq!(store.as_slice()[0].id, "b");
        assert_eq!(store.as_slice()[1].id, "a");
    }

    #[test]
    fn test_update_rejects_field_keeps_others() {
        let mut store = EntityStore::new(10.0);
        store.add(marker("a", 1.0)).unwrap();

        let report = store.update(
            "a",
            MarkerPatch {
                at: Some(f64::NAN),
                label: Some("renamed".to_string()),
            },
        );

        assert!(report.found);
        assert_eq!(report.changed, vec!["label"]);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].field, "at");
        assert!(report.rejection_message().is_some());

        let m = store.find("a").unwrap();
        assert_eq!(m.at, 1.0);
        assert_eq!(m.label, "renamed");
    }

    #[test]
    fn test_snapshot_is_not_torn_by_later_edits() {
        let mut store = EntityStore::new(10.0);
        store.add(marker("a", 1.0)).unwrap();
        let snapshot = store.snapshot();

        store.remove("a");
        store.add(marker("b", 2.0)).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "a");
        assert_eq!(store.as_slice()[0].id, "b");
    }

    #[test]
    fn test_replace_all_is_atomic() {
        let mut store = EntityStore::new(10.0);
        store.add(marker("keep", 1.0)).unwrap();

        let result = store.replace_all(vec![marker("x", 2.0), marker("y", f64::NAN)]);
        assert!(result.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.as_slice()[0].id, "keep");

        let count = store
            .replace_all(vec![marker("y", 4.0), marker("x", 2.0)])
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.as_slice()[0].id, "x");
    }

    #[test]
    fn test_start_sorted_store_cannot_be_reordered() {
        let mut store = EntityStore::new(10.0);
        store.add(marker("a", 1.0)).unwrap();
        assert!(store.move_to("a", 0).is_err());
    }

    #[test]
    fn test_clamp_interval() {
        assert_eq!(clamp_interval(-1.0, 4.0, 10.0).unwrap(), (0.0, 4.0));
        assert_eq!(clamp_interval(2.0, 15.0, 10.0).unwrap(), (2.0, 10.0));
        assert!(matches!(
            clamp_interval(4.0, 4.0, 10.0),
            Err(CoreError::InvalidTimeRange(_, _))
        ));
        assert!(matches!(
            clamp_interval(12.0, 15.0, 10.0),
            Err(CoreError::InvalidTimeRange(_, _))
        ));
        assert!(clamp_interval(f64::NAN, 1.0, 10.0).is_err());
    }
}
