//! Transition Curves
//!
//! Pure functions mapping a transition's progress to the visual parameter
//! the presentation layer animates. No state is kept between frames.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{Transition, TransitionKind};
use crate::core::TimeSec;

/// Tunables for progress-derived visuals
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveParams {
    /// Extra scale at the start of a zoom (0.2 = starts at 120 %)
    pub zoom_delta: f64,
    /// Peak blur of a dissolve in pixels
    pub dissolve_max_blur_px: f64,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            zoom_delta: 0.2,
            dissolve_max_blur_px: 8.0,
        }
    }
}

/// Normalized position in `[0, 1]` of `time` within the transition window.
///
/// Zero-length windows report 1 from their start on. Times at or past the
/// end report exactly 1.
pub fn progress(transition: &Transition, time: TimeSec) -> f64 {
    if transition.duration <= 0.0 || time >= transition.end_time() {
        return 1.0;
    }
    ((time - transition.start_time) / transition.duration).clamp(0.0, 1.0)
}

/// Visual parameter of a transition at a given progress
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TransitionVisual {
    /// Hard switch, nothing to animate
    Cut,
    /// Black overlay opacity, rising to 1 at the midpoint and back to 0
    Fade { opacity: f64 },
    /// Incoming frame offset from the right edge in percent of width
    #[serde(rename_all = "camelCase")]
    Slide { offset_percent: f64 },
    /// Frame scale, easing from `1 + zoom_delta` to 1
    Zoom { scale: f64 },
    /// Revealed fraction of the frame, left to right (clip-path inset)
    Wipe { reveal: f64 },
    /// Blend overlay opacity and blur, both following `sin(pi * p)`
    #[serde(rename_all = "camelCase")]
    Dissolve { opacity: f64, blur_px: f64 },
}

impl TransitionVisual {
    /// Computes the visual for `kind` at progress `p` (clamped to `[0, 1]`)
    pub fn at(kind: TransitionKind, p: f64, params: &CurveParams) -> Self {
        let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 1.0 };
        match kind {
            TransitionKind::Cut => Self::Cut,
            TransitionKind::Fade => Self::Fade {
                opacity: 1.0 - (2.0 * p - 1.0).abs(),
            },
            TransitionKind::Slide => Self::Slide {
                offset_percent: (1.0 - p) * 100.0,
            },
            TransitionKind::Zoom => Self::Zoom {
                scale: 1.0 + params.zoom_delta * (1.0 - p),
            },
            TransitionKind::Wipe => Self::Wipe { reveal: p },
            TransitionKind::Dissolve => {
                let wave = (PI * p).sin().max(0.0);
                Self::Dissolve {
                    opacity: wave,
                    blur_px: params.dissolve_max_blur_px * wave,
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
