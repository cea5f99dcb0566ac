//! Timeline Data Models
//!
//! B-roll overlay clips and transitions placed on the main video timeline.

use serde::{Deserialize, Serialize};

use super::store::{
    clamp_interval, non_negative_seconds, patch_interval, PatchOutcome, StoreOrder,
    TimelineEntity,
};
use crate::core::{BRollId, CoreError, CoreResult, MediaRef, TimeSec, TransitionId};

// =============================================================================
// Canvas
// =============================================================================

/// Canvas size in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the aspect ratio as a float
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

// =============================================================================
// Frame Rectangle
// =============================================================================

/// Rectangle in percent of the frame (0-100 on both axes)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FrameRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full_screen() -> Self {
        Self::new(0.0, 0.0, 100.0, 100.0)
    }

    /// Validates every edge against the frame bounds
    pub fn validate(&self) -> CoreResult<()> {
        percent_in_frame("position.x", self.x)?;
        percent_in_frame("position.y", self.y)?;
        percent_extent("position.width", self.width)?;
        percent_extent("position.height", self.height)?;
        Ok(())
    }

    /// Converts to pixel geometry on the given canvas
    pub fn to_pixels(&self, canvas: Canvas) -> PixelRect {
        let w = canvas.width as f64;
        let h = canvas.height as f64;
        PixelRect {
            x: self.x / 100.0 * w,
            y: self.y / 100.0 * h,
            width: self.width / 100.0 * w,
            height: self.height / 100.0 * h,
        }
    }
}

impl Default for FrameRect {
    fn default() -> Self {
        Self::new(20.0, 20.0, 30.0, 30.0)
    }
}

/// Rectangle in pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

fn percent_in_frame(field: &'static str, value: f64) -> CoreResult<f64> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(CoreError::invalid(
            field,
            format!("must be within 0..=100, got {value}"),
        ));
    }
    Ok(value)
}

fn percent_extent(field: &'static str, value: f64) -> CoreResult<f64> {
    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(CoreError::invalid(
            field,
            format!("must be greater than 0 and at most 100, got {value}"),
        ));
    }
    Ok(value)
}

fn unit_opacity(value: f64) -> CoreResult<f64> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(CoreError::invalid(
            "opacity",
            format!("must be within 0..=1, got {value}"),
        ));
    }
    Ok(value)
}

/// Quick placements offered by the B-roll panel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RectPreset {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    FullScreen,
}

impl RectPreset {
    pub fn rect(&self) -> FrameRect {
        match self {
            Self::TopLeft => FrameRect::new(5.0, 5.0, 25.0, 25.0),
            Self::TopRight => FrameRect::new(70.0, 5.0, 25.0, 25.0),
            Self::BottomLeft => FrameRect::new(5.0, 70.0, 25.0, 25.0),
            Self::BottomRight => FrameRect::new(70.0, 70.0, 25.0, 25.0),
            Self::Center => FrameRect::new(37.5, 37.5, 25.0, 25.0),
            Self::FullScreen => FrameRect::full_screen(),
        }
    }
}

// =============================================================================
// B-roll Clip
// =============================================================================

/// Secondary media overlaid on the main video for a sub-interval
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BRollClip {
    #[serde(default)]
    pub id: BRollId,
    pub source: MediaRef,
    pub start_time: TimeSec,
    pub end_time: TimeSec,
    #[serde(default)]
    pub position: FrameRect,
    /// Opacity (0.0 - 1.0)
    #[serde(default = "default_broll_opacity")]
    pub opacity: f64,
}

fn default_broll_opacity() -> f64 {
    0.8
}

impl BRollClip {
    pub fn new(source: MediaRef, start_time: TimeSec, end_time: TimeSec) -> Self {
        Self {
            id: String::new(),
            source,
            start_time,
            end_time,
            position: FrameRect::default(),
            opacity: default_broll_opacity(),
        }
    }

    /// Places media of the given length at the playhead, cut at the end of
    /// the main video.
    pub fn at_playhead(
        source: MediaRef,
        playhead: TimeSec,
        media_duration: TimeSec,
        video_duration: TimeSec,
    ) -> Self {
        let end = (playhead + media_duration).min(video_duration);
        Self::new(source, playhead, end)
    }

    pub fn with_position(mut self, position: FrameRect) -> Self {
        self.position = position;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn duration(&self) -> TimeSec {
        self.end_time - self.start_time
    }

    /// Returns true if the clip is on screen at the given time (inclusive)
    pub fn is_active_at(&self, time: TimeSec) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

/// Partial update of a B-roll clip
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BRollPatch {
    pub source: Option<MediaRef>,
    pub start_time: Option<TimeSec>,
    pub end_time: Option<TimeSec>,
    pub position: Option<FrameRect>,
    pub opacity: Option<f64>,
}

impl TimelineEntity for BRollClip {
    type Patch = BRollPatch;
    const KIND: &'static str = "broll";
    const ORDER: StoreOrder = StoreOrder::Insertion;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn start_time(&self) -> TimeSec {
        self.start_time
    }

    fn normalize(&mut self, video_duration: TimeSec) -> CoreResult<()> {
        if self.source.uri.trim().is_empty() {
            return Err(CoreError::invalid("source", "must not be empty"));
        }
        let (start, end) = clamp_interval(self.start_time, self.end_time, video_duration)?;
        self.start_time = start;
        self.end_time = end;
        self.position.validate()?;
        unit_opacity(self.opacity)?;
        Ok(())
    }

    fn apply_patch(&mut self, patch: BRollPatch, video_duration: TimeSec) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();

        if let Some(source) = patch.source {
            if source.uri.trim().is_empty() {
                outcome.reject("source", CoreError::invalid("source", "must not be empty"));
            } else {
                self.source = source;
                outcome.accept("source");
            }
        }

        let current = (self.start_time, self.end_time);
        if let Some((start, end)) = patch_interval(
            &mut outcome,
            current,
            patch.start_time,
            patch.end_time,
            video_duration,
        ) {
            self.start_time = start;
            self.end_time = end;
        }

        if let Some(position) = patch.position {
            outcome.record("position", position.validate().map(|_| position), |p| {
                self.position = p
            });
        }

        if let Some(opacity) = patch.opacity {
            outcome.record("opacity", unit_opacity(opacity), |o| self.opacity = o);
        }

        outcome
    }
}

// =============================================================================
// Transition
// =============================================================================

/// Transition effect kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
    Cut,
    #[default]
    Fade,
    Slide,
    Zoom,
    Wipe,
    Dissolve,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 6] = [
        Self::Cut,
        Self::Fade,
        Self::Slide,
        Self::Zoom,
        Self::Wipe,
        Self::Dissolve,
    ];

    /// Duration the editor proposes for a new transition of this kind
    pub fn default_duration(&self) -> TimeSec {
        match self {
            Self::Cut => 0.0,
            Self::Fade => 0.5,
            Self::Slide => 0.8,
            Self::Zoom => 1.0,
            Self::Wipe => 1.2,
            Self::Dissolve => 1.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cut => "Cut",
            Self::Fade => "Fade",
            Self::Slide => "Slide",
            Self::Zoom => "Zoom",
            Self::Wipe => "Wipe",
            Self::Dissolve => "Dissolve",
        }
    }
}

/// A timed visual effect starting at a moment of playback
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    #[serde(default)]
    pub id: TransitionId,
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    pub start_time: TimeSec,
    /// Window length in seconds (0 = instantaneous)
    pub duration: TimeSec,
}

impl Transition {
    pub fn new(kind: TransitionKind, start_time: TimeSec, duration: TimeSec) -> Self {
        Self {
            id: String::new(),
            kind,
            start_time,
            duration,
        }
    }

    /// Creates a transition with the kind's default duration
    pub fn with_default_duration(kind: TransitionKind, start_time: TimeSec) -> Self {
        Self::new(kind, start_time, kind.default_duration())
    }

    pub fn end_time(&self) -> TimeSec {
        self.start_time + self.duration
    }

    /// Returns true if the window contains the given time.
    ///
    /// A zero-length window is active only at its start.
    pub fn is_active_at(&self, time: TimeSec) -> bool {
        self.start_time <= time && time <= self.end_time()
    }

    /// Returns true if the two windows overlap.
    ///
    /// Windows that only touch do not overlap; an instantaneous window
    /// overlaps any window containing its instant.
    pub fn overlaps(&self, other: &Transition) -> bool {
        if self.duration == 0.0 {
            return other.is_active_at(self.start_time);
        }
        if other.duration == 0.0 {
            return self.is_active_at(other.start_time);
        }
        self.start_time < other.end_time() && self.end_time() > other.start_time
    }
}

fn transition_start(value: TimeSec, video_duration: TimeSec) -> CoreResult<TimeSec> {
    if !value.is_finite() {
        return Err(CoreError::invalid("startTime", "must be a finite number"));
    }
    Ok(value.clamp(0.0, video_duration))
}

/// Partial update of a transition
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransitionPatch {
    #[serde(rename = "type")]
    pub kind: Option<TransitionKind>,
    pub start_time: Option<TimeSec>,
    pub duration: Option<TimeSec>,
}

impl TimelineEntity for Transition {
    type Patch = TransitionPatch;
    const KIND: &'static str = "transition";
    const ORDER: StoreOrder = StoreOrder::ByStart;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn start_time(&self) -> TimeSec {
        self.start_time
    }

    fn normalize(&mut self, video_duration: TimeSec) -> CoreResult<()> {
        self.start_time = transition_start(self.start_time, video_duration)?;
        self.duration = non_negative_seconds("duration", self.duration)?;
        Ok(())
    }

    fn apply_patch(&mut self, patch: TransitionPatch, video_duration: TimeSec) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();

        if let Some(kind) = patch.kind {
            self.kind = kind;
            outcome.accept("type");
        }

        if let Some(start) = patch.start_time {
            let before = self.start_time;
            outcome.record(
                "startTime",
                transition_start(start, video_duration),
                |s| self.start_time = s,
            );
            outcome.timing_changed = self.start_time != before;
        }

        if let Some(duration) = patch.duration {
            outcome.record(
                "duration",
                non_negative_seconds("duration", duration),
                |d| self.duration = d,
            );
        }

        outcome
    }
}

// =============================================================================
// Tests
// =============================================================================
