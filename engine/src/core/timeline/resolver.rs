//! Timeline Resolver
//!
//! Answers "what is on screen at time `t`" for the three entity layers.
//!
//! Resolution is a pure function of its inputs. Callers that need the
//! caption re-entry flag pass the previously active caption id back in;
//! [`PlaybackCursor`] does that bookkeeping for sequential playback.
//!
//! Precedence rules:
//! - Caption: first caption in store order whose `[start, end]` contains `t`.
//!   Overlapping captions are allowed; the earliest stored one wins.
//! - B-roll: every clip whose `[start, end]` contains `t`, in store order
//!   (later clips draw on top).
//! - Transition: first transition whose `[start, start + duration]` contains
//!   `t`. Overlapping windows are a caller error and are not arbitrated.

use serde::Serialize;

use super::{transitions::progress, BRollClip, Transition};
use crate::core::{captions::Caption, TimeSec};

/// The caption on screen, with its re-entry flag
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCaption {
    pub caption: Caption,
    /// True when this caption was not the one active on the previous call,
    /// so its entry animation starts over
    pub restarted: bool,
}

/// The transition in progress, with its normalized position
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTransition {
    pub transition: Transition,
    pub progress: f64,
}

/// Everything active at one instant
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedState {
    pub time: TimeSec,
    pub caption: Option<ActiveCaption>,
    pub brolls: Vec<BRollClip>,
    pub transition: Option<ActiveTransition>,
}

impl ResolvedState {
    /// Id of the active caption, to feed into the next resolution
    pub fn caption_id(&self) -> Option<&str> {
        self.caption.as_ref().map(|c| c.caption.id.as_str())
    }

    /// Returns true when nothing besides the base video is active
    pub fn is_empty(&self) -> bool {
        self.caption.is_none() && self.brolls.is_empty() && self.transition.is_none()
    }
}

/// Resolves the active caption, B-roll clips and transition at `time`.
///
/// Entities are copied into the result, so later store edits never
/// change an already resolved state.
pub fn resolve(
    time: TimeSec,
    captions: &[Caption],
    brolls: &[BRollClip],
    transitions: &[Transition],
    previous_caption_id: Option<&str>,
) -> ResolvedState {
    let caption = captions
        .iter()
        .find(|c| c.is_active_at(time))
        .map(|c| ActiveCaption {
            restarted: previous_caption_id != Some(c.id.as_str()),
            caption: c.clone(),
        });

    let brolls = brolls
        .iter()
        .filter(|b| b.is_active_at(time))
        .cloned()
        .collect();

    let transition = transitions
        .iter()
        .find(|t| t.is_active_at(time))
        .map(|t| ActiveTransition {
            progress: progress(t, time),
            transition: t.clone(),
        });

    ResolvedState {
        time,
        caption,
        brolls,
        transition,
    }
}

// =============================================================================
// Playback Cursor
// =============================================================================

/// Sequential resolution helper for one presentation session.
///
/// Remembers the last active caption id between ticks. Seeking does not
/// need special handling: a different caption simply reports `restarted`.
#[derive(Clone, Debug, Default)]
pub struct PlaybackCursor {
    previous_caption_id: Option<String>,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `time` and remembers the active caption for the next tick
    pub fn advance(
        &mut self,
        time: TimeSec,
        captions: &[Caption],
        brolls: &[BRollClip],
        transitions: &[Transition],
    ) -> ResolvedState {
        let state = resolve(
            time,
            captions,
            brolls,
            transitions,
            self.previous_caption_id.as_deref(),
        );
        self.previous_caption_id = state.caption_id().map(str::to_string);
        state
    }

    pub fn previous_caption_id(&self) -> Option<&str> {
        self.previous_caption_id.as_deref()
    }

    /// Forgets the last caption, so the next active one restarts
    pub fn reset(&mut self) {
        self.previous_caption_id = None;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{timeline::TransitionKind, MediaRef};

    fn captions() -> Vec<Caption> {
        vec![
            Caption::new("a", 0.0, 3.0, "Welcome"),
            Caption::new("b", 2.5, 6.5, "Overlapping"),
            Caption::new("c", 7.0, 10.0, "Last"),
        ]
    }

    fn brolls() -> Vec<BRollClip> {
        let mut first = BRollClip::new(MediaRef::new("one.mp4"), 1.0, 5.0);
        first.id = "b1".to_string();
        let mut second = BRollClip::new(MediaRef::new("two.mp4"), 4.0, 8.0);
        second.id = "b2".to_string();
        vec![first, second]
    }

    fn transitions() -> Vec<Transition> {
        let mut fade = Transition::new(TransitionKind::Fade, 3.0, 1.0);
        fade.id = "t1".to_string();
        let mut cut = Transition::new(TransitionKind::Cut, 7.0, 0.0);
        cut.id = "t2".to_string();
        vec![fade, cut]
    }

    // -------------------------------------------------------------------------
    // Caption Resolution
    // -------------------------------------------------------------------------

    #[test]
    fn test_no_caption_outside_every_range() {
        let caps = captions();
        for time in [-1.0, 6.75, 10.01, 99.0] {
            let state = resolve(time, &caps, &[], &[], None);
            assert!(state.caption.is_none(), "time {time}");
        }
    }

    #[test]
    fn test_caption_bounds_are_inclusive() {
        let caps = captions();
        assert_eq!(resolve(7.0, &caps, &[], &[], None).caption_id(), Some("c"));
        assert_eq!(resolve(10.0, &caps, &[], &[], None).caption_id(), Some("c"));
    }

    #[test]
    fn test_overlap_earliest_stored_wins() {
        let caps = captions();
        let state = resolve(2.75, &caps, &[], &[], None);
        assert_eq!(state.caption_id(), Some("a"));

        let state = resolve(3.5, &caps, &[], &[], None);
        assert_eq!(state.caption_id(), Some("b"));
    }

    #[test]
    fn test_restarted_flag() {
        let caps = captions();
        let first = resolve(1.0, &caps, &[], &[], None);
        assert!(first.caption.as_ref().unwrap().restarted);

        let same = resolve(1.5, &caps, &[], &[], Some("a"));
        assert!(!same.caption.as_ref().unwrap().restarted);

        let changed = resolve(4.0, &caps, &[], &[], Some("a"));
        assert!(changed.caption.as_ref().unwrap().restarted);
    }

    // -------------------------------------------------------------------------
    // B-roll Resolution
    // -------------------------------------------------------------------------

    #[test]
    fn test_all_active_brolls_in_store_order() {
        let clips = brolls();
        let ids = |t: TimeSec| -> Vec<String> {
            resolve(t, &[], &clips, &[], None)
                .brolls
                .into_iter()
                .map(|b| b.id)
                .collect()
        };

        assert!(ids(0.5).is_empty());
        assert_eq!(ids(2.0), vec!["b1"]);
        assert_eq!(ids(4.5), vec!["b1", "b2"]);
        assert_eq!(ids(5.0), vec!["b1", "b2"]);
        assert_eq!(ids(8.0), vec!["b2"]);
    }

    #[test]
    fn test_broll_count_matches_containing_intervals() {
        let clips = brolls();
        for i in 0..100 {
            let t = i as f64 * 0.1;
            let expected = clips.iter().filter(|c| c.is_active_at(t)).count();
            assert_eq!(resolve(t, &[], &clips, &[], None).brolls.len(), expected);
        }
    }

    // -------------------------------------------------------------------------
    // Transition Resolution
    // -------------------------------------------------------------------------

    #[test]
    fn test_transition_window_and_progress() {
        let trans = transitions();

        let state = resolve(3.5, &[], &[], &trans, None);
        let active = state.transition.unwrap();
        assert_eq!(active.transition.id, "t1");
        assert!((active.progress - 0.5).abs() < 1e-9);

        let state = resolve(4.0, &[], &[], &trans, None);
        assert_eq!(state.transition.unwrap().progress, 1.0);

        assert!(resolve(4.01, &[], &[], &trans, None).transition.is_none());
    }

    #[test]
    fn test_zero_duration_transition_is_single_instant() {
        let trans = transitions();

        let state = resolve(7.0, &[], &[], &trans, None);
        let active = state.transition.unwrap();
        assert_eq!(active.transition.id, "t2");
        assert_eq!(active.progress, 1.0);

        assert!(resolve(7.001, &[], &[], &trans, None).transition.is_none());
    }

    // -------------------------------------------------------------------------
    // Purity
    // -------------------------------------------------------------------------

    #[test]
    fn test_resolve_is_idempotent() {
        let (caps, clips, trans) = (captions(), brolls(), transitions());
        let a = resolve(3.25, &caps, &clips, &trans, Some("a"));
        let b = resolve(3.25, &caps, &clips, &trans, Some("a"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_collections_resolve_to_nothing() {
        let state = resolve(1.0, &[], &[], &[], None);
        assert!(state.is_empty());
    }

    // -------------------------------------------------------------------------
    // Playback Cursor
    // -------------------------------------------------------------------------

    #[test]
    fn test_cursor_threads_previous_caption() {
        let caps = captions();
        let mut cursor = PlaybackCursor::new();

        assert!(cursor.advance(0.5, &caps, &[], &[]).caption.unwrap().restarted);
        assert!(!cursor.advance(1.0, &caps, &[], &[]).caption.unwrap().restarted);
        assert_eq!(cursor.previous_caption_id(), Some("a"));

        // Gap clears the previous id
        assert!(cursor.advance(6.8, &caps, &[], &[]).caption.is_none());
        assert_eq!(cursor.previous_caption_id(), None);
        assert!(cursor.advance(7.5, &caps, &[], &[]).caption.unwrap().restarted);

        cursor.reset();
        assert!(cursor.advance(8.0, &caps, &[], &[]).caption.unwrap().restarted);
    }
}
