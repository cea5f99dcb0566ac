//! Caption Data Models
//!
//! Defines the caption entity, its text style and its entry animation.
//!
//! # Overview
//!
//! Captions in CaptionReel carry:
//! - Text and a `[startTime, endTime]` range on the main video
//! - A style block (font, colors, vertical position)
//! - An entry animation block (type, duration, delay)

use serde::{Deserialize, Serialize};

use crate::core::{
    color::Color,
    timeline::{
        clamp_interval, non_negative_seconds, patch_interval, PatchOutcome, StoreOrder,
        TimelineEntity,
    },
    CaptionId, CoreError, CoreResult, TimeSec,
};

/// Smallest accepted font size in pixels
pub const MIN_FONT_SIZE: u32 = 1;

/// Largest accepted font size in pixels
pub const MAX_FONT_SIZE: u32 = 512;

// =============================================================================
// Caption Positioning
// =============================================================================

/// Vertical position of caption on screen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum VerticalPosition {
    /// Top of screen
    Top,
    /// Center of screen
    Center,
    /// Bottom of screen (default for subtitles)
    #[default]
    Bottom,
}

// =============================================================================
// Caption Styling
// =============================================================================

/// Caption text style
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionStyle {
    /// Font size in pixels
    pub font_size: u32,
    /// Text color
    pub color: Color,
    /// Background/box color
    pub background_color: Color,
    /// Font family name
    pub font_family: String,
    /// Vertical anchor on screen
    pub position: VerticalPosition,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 24,
            color: Color::white(),
            background_color: Color::rgba(0, 0, 0, 0.7),
            font_family: "Inter".to_string(),
            position: VerticalPosition::Bottom,
        }
    }
}

impl CaptionStyle {
    /// Validates font size and family
    pub fn validate(&self) -> CoreResult<()> {
        validate_font_size(self.font_size)?;
        validate_font_family(&self.font_family)?;
        Ok(())
    }
}

fn validate_font_size(size: u32) -> CoreResult<u32> {
    if !(MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&size) {
        return Err(CoreError::invalid(
            "style.fontSize",
            format!("must be within {MIN_FONT_SIZE}..={MAX_FONT_SIZE}, got {size}"),
        ));
    }
    Ok(size)
}

fn validate_font_family(family: &str) -> CoreResult<String> {
    let trimmed = family.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid("style.fontFamily", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

// =============================================================================
// Caption Animation
// =============================================================================

/// Entry animation applied when a caption becomes active
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum AnimationType {
    #[default]
    None,
    FadeIn,
    SlideUp,
    SlideDown,
    SlideLeft,
    SlideRight,
    Zoom,
    Bounce,
    Typewriter,
    Glow,
}

impl AnimationType {
    pub const ALL: [AnimationType; 10] = [
        Self::None,
        Self::FadeIn,
        Self::SlideUp,
        Self::SlideDown,
        Self::SlideLeft,
        Self::SlideRight,
        Self::Zoom,
        Self::Bounce,
        Self::Typewriter,
        Self::Glow,
    ];

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::FadeIn => "Fade In",
            Self::SlideUp => "Slide Up",
            Self::SlideDown => "Slide Down",
            Self::SlideLeft => "Slide Left",
            Self::SlideRight => "Slide Right",
            Self::Zoom => "Zoom In",
            Self::Bounce => "Bounce",
            Self::Typewriter => "Typewriter",
            Self::Glow => "Glow",
        }
    }
}

/// Caption entry animation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionAnimation {
    #[serde(rename = "type")]
    pub kind: AnimationType,
    /// Duration in seconds
    pub duration: f64,
    /// Delay after the caption starts, in seconds
    pub delay: f64,
}

impl Default for CaptionAnimation {
    fn default() -> Self {
        Self {
            kind: AnimationType::None,
            duration: 0.5,
            delay: 0.0,
        }
    }
}

impl CaptionAnimation {
    pub fn new(kind: AnimationType, duration: f64, delay: f64) -> Self {
        Self {
            kind,
            duration,
            delay,
        }
    }

    /// Validates duration and delay
    pub fn validate(&self) -> CoreResult<()> {
        non_negative_seconds("animation.duration", self.duration)?;
        non_negative_seconds("animation.delay", self.delay)?;
        Ok(())
    }
}

/// Named animation presets offered by the editor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnimationPreset {
    Subtle,
    Dynamic,
    Energetic,
    Dramatic,
    Typewriter,
}

impl AnimationPreset {
    pub fn animation(&self) -> CaptionAnimation {
        match self {
            Self::Subtle => CaptionAnimation::new(AnimationType::FadeIn, 0.5, 0.0),
            Self::Dynamic => CaptionAnimation::new(AnimationType::SlideUp, 0.8, 0.2),
            Self::Energetic => CaptionAnimation::new(AnimationType::Bounce, 1.0, 0.0),
            Self::Dramatic => CaptionAnimation::new(AnimationType::Zoom, 1.2, 0.3),
            Self::Typewriter => CaptionAnimation::new(AnimationType::Typewriter, 2.0, 0.0),
        }
    }
}

// =============================================================================
// Caption Entry
// =============================================================================

/// A single caption entry with text, timing, style and animation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    /// Unique identifier (empty = assigned on insert)
    #[serde(default)]
    pub id: CaptionId,
    /// Caption text (may contain line breaks)
    pub text: String,
    /// Start time in seconds
    pub start_time: TimeSec,
    /// End time in seconds
    pub end_time: TimeSec,
    #[serde(default)]
    pub style: CaptionStyle,
    #[serde(default)]
    pub animation: CaptionAnimation,
}

impl Caption {
    /// Creates a new caption with the given text and timing
    pub fn new(id: &str, start_time: TimeSec, end_time: TimeSec, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            start_time,
            end_time,
            style: CaptionStyle::default(),
            animation: CaptionAnimation::default(),
        }
    }

    /// Creates a caption whose id is assigned by the store
    pub fn create(start_time: TimeSec, end_time: TimeSec, text: &str) -> Self {
        Self::new("", start_time, end_time, text)
    }

    /// Sets the style block
    pub fn with_style(mut self, style: CaptionStyle) -> Self {
        self.style = style;
        self
    }

    /// Sets the animation block
    pub fn with_animation(mut self, animation: CaptionAnimation) -> Self {
        self.animation = animation;
        self
    }

    /// Returns the duration of this caption in seconds
    pub fn duration(&self) -> TimeSec {
        self.end_time - self.start_time
    }

    /// Returns true if the caption is active at the given time (both ends inclusive)
    pub fn is_active_at(&self, time: TimeSec) -> bool {
        self.start_time <= time && time <= self.end_time
    }

    /// Returns true if this caption overlaps with another.
    ///
    /// Captions that only touch at a boundary do not overlap.
    pub fn overlaps(&self, other: &Caption) -> bool {
        self.start_time < other.end_time && self.end_time > other.start_time
    }
}

fn normalize_caption_text(text: &str) -> CoreResult<String> {
    let trimmed = text.trim_matches(['\u{FEFF}', '\u{0000}']);
    if trimmed.trim().is_empty() {
        return Err(CoreError::invalid("text", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

// =============================================================================
// Partial Updates
// =============================================================================

/// Partial update of a caption's style block
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionStylePatch {
    pub font_size: Option<u32>,
    pub color: Option<Color>,
    pub background_color: Option<Color>,
    pub font_family: Option<String>,
    pub position: Option<VerticalPosition>,
}

/// Partial update of a caption's animation block
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimationPatch {
    #[serde(rename = "type")]
    pub kind: Option<AnimationType>,
    pub duration: Option<f64>,
    pub delay: Option<f64>,
}

/// Partial update of a caption
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptionPatch {
    pub text: Option<String>,
    pub start_time: Option<TimeSec>,
    pub end_time: Option<TimeSec>,
    pub style: Option<CaptionStylePatch>,
    pub animation: Option<AnimationPatch>,
}

impl CaptionPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn timing(start_time: TimeSec, end_time: TimeSec) -> Self {
        Self {
            start_time: Some(start_time),
            end_time: Some(end_time),
            ..Default::default()
        }
    }

    pub fn style(style: CaptionStylePatch) -> Self {
        Self {
            style: Some(style),
            ..Default::default()
        }
    }

    pub fn animation(animation: AnimationPatch) -> Self {
        Self {
            animation: Some(animation),
            ..Default::default()
        }
    }
}

impl TimelineEntity for Caption {
    type Patch = CaptionPatch;
    const KIND: &'static str = "caption";
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
        self.text = normalize_caption_text(&self.text)?;
        let (start, end) = clamp_interval(self.start_time, self.end_time, video_duration)?;
        self.start_time = start;
        self.end_time = end;
        self.style.validate()?;
        self.style.font_family = self.style.font_family.trim().to_string();
        self.animation.validate()?;
        Ok(())
    }

    fn apply_patch(&mut self, patch: CaptionPatch, video_duration: TimeSec) -> PatchOutcome {
        let mut outcome = PatchOutcome::default();

        if let Some(text) = patch.text {
            outcome.record("text", normalize_caption_text(&text), |t| self.text = t);
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

        if let Some(style) = patch.style {
            if let Some(size) = style.font_size {
                outcome.record("style.fontSize", validate_font_size(size), |s| {
                    self.style.font_size = s
                });
            }
            if let Some(color) = style.color {
                self.style.color = color;
                outcome.accept("style.color");
            }
            if let Some(background) = style.background_color {
                self.style.background_color = background;
                outcome.accept("style.backgroundColor");
            }
            if let Some(family) = style.font_family {
                outcome.record("style.fontFamily", validate_font_family(&family), |f| {
                    self.style.font_family = f
                });
            }
            if let Some(position) = style.position {
                self.style.position = position;
                outcome.accept("style.position");
            }
        }

        if let Some(animation) = patch.animation {
            if let Some(kind) = animation.kind {
                self.animation.kind = kind;
                outcome.accept("animation.type");
            }
            if let Some(duration) = animation.duration {
                outcome.record(
                    "animation.duration",
                    non_negative_seconds("animation.duration", duration),
                    |d| self.animation.duration = d,
                );
            }
            if let Some(delay) = animation.delay {
                outcome.record(
                    "animation.delay",
                    non_negative_seconds("animation.delay", delay),
                    |d| self.animation.delay = d,
                );
            }
        }

        outcome
    }
}

// =============================================================================
// Tests
// =============================================================================
