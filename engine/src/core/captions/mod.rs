//! Caption System Module
//!
//! Provides caption functionality for CaptionReel including:
//! - Caption data models (Caption, CaptionStyle, CaptionAnimation)
//! - SRT and VTT export and import
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Caption System                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  models.rs     - Data structures (Caption, Style, Animation)    │
//! │  formats.rs    - SRT/VTT export and parsing                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use captionreel_lib::core::captions::{export_srt, parse_vtt, Caption};
//!
//! let captions = vec![
//!     Caption::create(0.0, 1.5, "Hello"),
//!     Caption::create(2.0, 3.25, "World"),
//! ];
//! let srt = export_srt(&captions);
//!
//! let segments = parse_vtt(&std::fs::read_to_string("captions.vtt")?)?;
//! ```

mod formats;
mod models;

pub use models::{
    AnimationPatch, AnimationPreset, AnimationType, Caption, CaptionAnimation, CaptionPatch,
    CaptionStyle, CaptionStylePatch, VerticalPosition, MAX_FONT_SIZE, MIN_FONT_SIZE,
};

pub use formats::{
    export, export_srt, export_vtt, parse, parse_srt, parse_vtt, ParseError, SubtitleFormat,
};

use serde::{Deserialize, Serialize};

/// Which blocks a bulk style copy transfers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum StyleScope {
    /// Text style only
    Style,
    /// Entry animation only
    Animation,
    /// Style and animation
    #[default]
    All,
}

impl StyleScope {
    pub fn includes_style(&self) -> bool {
        matches!(self, Self::Style | Self::All)
    }

    pub fn includes_animation(&self) -> bool {
        matches!(self, Self::Animation | Self::All)
    }
}
