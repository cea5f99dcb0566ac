//! Composite State Builder
//!
//! Turns a [`ResolvedState`] into a render-ready [`CompositeFrame`].
//!
//! Layer order is fixed: base video, B-roll clips (store order), caption,
//! transition overlay. Every layer carries its `z_index` so the
//! presentation layer never decides stacking itself.

use serde::{Deserialize, Serialize};

use super::{
    resolver::{ActiveCaption, ActiveTransition, ResolvedState},
    transitions::{CurveParams, TransitionVisual},
    BRollClip, Canvas, FrameRect, PixelRect, TransitionKind,
};
use crate::core::{
    captions::{AnimationType, VerticalPosition},
    color::Color,
    MediaRef, TimeSec,
};

// =============================================================================
// Defaults
// =============================================================================

/// Constants the builder applies to every frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositeDefaults {
    /// Output canvas used for pixel geometry
    pub canvas: Canvas,
    /// Distance of top/bottom captions from the frame edge
    pub caption_edge_margin_px: f64,
    /// Widest a caption box may grow, in percent of frame width
    pub caption_max_width_percent: f64,
    pub font_weight: u16,
    pub line_height: f64,
    /// Shadow used by every animation type except glow
    pub drop_shadow: DropShadow,
    /// Inner and outer glow radii in pixels
    pub glow_radii_px: (f64, f64),
    pub curves: CurveParams,
}

impl Default for CompositeDefaults {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            caption_edge_margin_px: 32.0,
            caption_max_width_percent: 80.0,
            font_weight: 600,
            line_height: 1.2,
            drop_shadow: DropShadow::default(),
            glow_radii_px: (10.0, 20.0),
            curves: CurveParams::default(),
        }
    }
}

impl CompositeDefaults {
    /// Clamps every value into a usable range
    pub fn normalize(&mut self) {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            self.canvas = Canvas::default();
        }
        self.caption_edge_margin_px = finite_or(self.caption_edge_margin_px, 32.0).max(0.0);
        self.caption_max_width_percent =
            finite_or(self.caption_max_width_percent, 80.0).clamp(1.0, 100.0);
        self.font_weight = self.font_weight.clamp(100, 900);
        self.line_height = finite_or(self.line_height, 1.2).clamp(0.5, 4.0);
        let (inner, outer) = self.glow_radii_px;
        let inner = finite_or(inner, 10.0).max(0.0);
        self.glow_radii_px = (inner, finite_or(outer, 20.0).max(inner));
        self.drop_shadow.blur_px = finite_or(self.drop_shadow.blur_px, 4.0).max(0.0);
        self.curves.zoom_delta = finite_or(self.curves.zoom_delta, 0.2).clamp(0.0, 4.0);
        self.curves.dissolve_max_blur_px =
            finite_or(self.curves.dissolve_max_blur_px, 8.0).max(0.0);
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Offset text shadow
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropShadow {
    pub offset_x_px: f64,
    pub offset_y_px: f64,
    pub blur_px: f64,
    pub color: Color,
}

impl Default for DropShadow {
    fn default() -> Self {
        Self {
            offset_x_px: 2.0,
            offset_y_px: 2.0,
            blur_px: 4.0,
            color: Color::rgba(0, 0, 0, 0.5),
        }
    }
}

// =============================================================================
// Frame Layers
// =============================================================================

/// Main video, always at the bottom of the stack
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoLayer {
    /// Playback position of the main video
    pub time: TimeSec,
    pub z_index: u32,
}

/// One B-roll overlay
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BRollLayer {
    pub clip_id: String,
    pub source: MediaRef,
    /// Geometry in percent of the frame
    pub rect: FrameRect,
    /// Geometry on the configured canvas
    pub pixel_rect: PixelRect,
    pub opacity: f64,
    /// Playback position inside the B-roll media
    pub local_time: TimeSec,
    pub z_index: u32,
}

/// Text shadow of a caption
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TextShadow {
    #[serde(rename_all = "camelCase")]
    Drop {
        offset_x_px: f64,
        offset_y_px: f64,
        blur_px: f64,
        color: Color,
    },
    /// Two-radius glow in the caption's own text color
    #[serde(rename_all = "camelCase")]
    Glow {
        inner_radius_px: f64,
        outer_radius_px: f64,
        color: Color,
    },
}

impl TextShadow {
    /// CSS `text-shadow` value
    pub fn to_css(&self) -> String {
        match self {
            Self::Drop {
                offset_x_px,
                offset_y_px,
                blur_px,
                color,
            } => format!("{offset_x_px}px {offset_y_px}px {blur_px}px {color}"),
            Self::Glow {
                inner_radius_px,
                outer_radius_px,
                color,
            } => format!("0 0 {inner_radius_px}px {color}, 0 0 {outer_radius_px}px {color}"),
        }
    }
}

/// Where the caption box sits on screen
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionLayout {
    pub anchor: VerticalPosition,
    /// Distance from the anchored edge (0 when centered)
    pub edge_offset_px: f64,
    /// Reference line of the box on the canvas: its top edge for `top`,
    /// its center for `center`, its bottom edge for `bottom`
    pub y_px: f64,
    /// Vertical shift of the box relative to its own height
    pub translate_y_percent: f64,
    /// Box is centered horizontally
    pub center_x_percent: f64,
    pub max_width_percent: f64,
}

impl CaptionLayout {
    fn for_position(position: VerticalPosition, defaults: &CompositeDefaults) -> Self {
        let height = defaults.canvas.height as f64;
        let margin = defaults.caption_edge_margin_px;
        let (edge_offset_px, y_px, translate_y_percent) = match position {
            VerticalPosition::Top => (margin, margin, 0.0),
            VerticalPosition::Center => (0.0, height / 2.0, -50.0),
            VerticalPosition::Bottom => (margin, height - margin, -100.0),
        };
        Self {
            anchor: position,
            edge_offset_px,
            y_px,
            translate_y_percent,
            center_x_percent: 50.0,
            max_width_percent: defaults.caption_max_width_percent,
        }
    }
}

/// Font of the caption text
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub family: String,
    pub size_px: u32,
    pub weight: u16,
    pub line_height: f64,
}

/// How the presentation layer should drive the entry animation
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationDirective {
    #[serde(rename = "type")]
    pub kind: AnimationType,
    pub duration: f64,
    pub delay: f64,
    /// Reset animation timers before playing
    pub restarted: bool,
    /// Seconds since the animation began (negative while delayed)
    pub elapsed: f64,
    /// Normalized animation position in `[0, 1]`
    pub progress: f64,
    /// Glow keeps pulsing after its entry
    pub pulse: bool,
}

impl AnimationDirective {
    fn from_active(active: &ActiveCaption, time: TimeSec) -> Self {
        let animation = &active.caption.animation;
        let elapsed = time - active.caption.start_time - animation.delay;
        let progress = if animation.kind == AnimationType::None || elapsed >= animation.duration {
            1.0
        } else if elapsed <= 0.0 {
            0.0
        } else {
            (elapsed / animation.duration).clamp(0.0, 1.0)
        };

        Self {
            kind: animation.kind,
            duration: animation.duration,
            delay: animation.delay,
            restarted: active.restarted,
            elapsed,
            progress,
            pulse: animation.kind == AnimationType::Glow,
        }
    }
}

/// The active caption, fully styled
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionLayer {
    pub caption_id: String,
    pub text: String,
    pub layout: CaptionLayout,
    pub font: FontSpec,
    pub color: Color,
    pub background_color: Color,
    pub shadow: TextShadow,
    pub animation: AnimationDirective,
    pub z_index: u32,
}

/// The transition in progress, drawn above everything else
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOverlay {
    pub transition_id: String,
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    pub progress: f64,
    pub visual: TransitionVisual,
    pub z_index: u32,
}

/// Render-ready description of every layer at one instant
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeFrame {
    pub time: TimeSec,
    pub canvas: Canvas,
    pub video: VideoLayer,
    pub brolls: Vec<BRollLayer>,
    pub caption: Option<CaptionLayer>,
    pub transition: Option<TransitionOverlay>,
}

impl CompositeFrame {
    /// Number of layers, the base video included
    pub fn layer_count(&self) -> usize {
        1 + self.brolls.len()
            + usize::from(self.caption.is_some())
            + usize::from(self.transition.is_some())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds the composite frame for a resolved state
pub fn build(resolved: &ResolvedState, defaults: &CompositeDefaults) -> CompositeFrame {
    let time = resolved.time;
    let mut z_index = 0;

    let video = VideoLayer { time, z_index };

    let brolls = resolved
        .brolls
        .iter()
        .map(|clip| {
            z_index += 1;
            broll_layer(clip, time, z_index, defaults)
        })
        .collect();

    let caption = resolved.caption.as_ref().map(|active| {
        z_index += 1;
        caption_layer(active, time, z_index, defaults)
    });

    let transition = resolved.transition.as_ref().map(|active| {
        z_index += 1;
        transition_overlay(active, z_index, defaults)
    });

    CompositeFrame {
        time,
        canvas: defaults.canvas,
        video,
        brolls,
        caption,
        transition,
    }
}

fn broll_layer(
    clip: &BRollClip,
    time: TimeSec,
    z_index: u32,
    defaults: &CompositeDefaults,
) -> BRollLayer {
    BRollLayer {
        clip_id: clip.id.clone(),
        source: clip.source.clone(),
        rect: clip.position,
        pixel_rect: clip.position.to_pixels(defaults.canvas),
        opacity: clip.opacity,
        local_time: (time - clip.start_time).max(0.0),
        z_index,
    }
}

fn caption_layer(
    active: &ActiveCaption,
    time: TimeSec,
    z_index: u32,
    defaults: &CompositeDefaults,
) -> CaptionLayer {
    let caption = &active.caption;
    let style = &caption.style;

    let shadow = if caption.animation.kind == AnimationType::Glow {
        let (inner, outer) = defaults.glow_radii_px;
        TextShadow::Glow {
            inner_radius_px: inner,
            outer_radius_px: outer,
            color: style.color,
        }
    } else {
        let drop = defaults.drop_shadow;
        TextShadow::Drop {
            offset_x_px: drop.offset_x_px,
            offset_y_px: drop.offset_y_px,
            blur_px: drop.blur_px,
            color: drop.color,
        }
    };

    CaptionLayer {
        caption_id: caption.id.clone(),
        text: caption.text.clone(),
        layout: CaptionLayout::for_position(style.position, defaults),
        font: FontSpec {
            family: style.font_family.clone(),
            size_px: style.font_size,
            weight: defaults.font_weight,
            line_height: defaults.line_height,
        },
        color: style.color,
        background_color: style.background_color,
        shadow,
        animation: AnimationDirective::from_active(active, time),
        z_index,
    }
}

fn transition_overlay(
    active: &ActiveTransition,
    z_index: u32,
    defaults: &CompositeDefaults,
) -> TransitionOverlay {
    let kind = active.transition.kind;
    TransitionOverlay {
        transition_id: active.transition.id.clone(),
        kind,
        progress: active.progress,
        visual: TransitionVisual::at(kind, active.progress, &defaults.curves),
        z_index,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        captions::{AnimationPreset, Caption, CaptionAnimation},
        timeline::{resolve, RectPreset, Transition},
    };

    fn scene() -> (Vec<Caption>, Vec<BRollClip>, Vec<Transition>) {
        let captions = vec![Caption::new("cap", 1.0, 4.0, "Hello")
            .with_animation(AnimationPreset::Dynamic.animation())];

        let mut first = BRollClip::new(MediaRef::new("one.mp4"), 0.0, 5.0)
            .with_position(RectPreset::TopLeft.rect());
        first.id = "b1".to_string();
        let mut second = BRollClip::new(MediaRef::new("two.mp4"), 2.0, 5.0)
            .with_position(FrameRect::new(50.0, 50.0, 50.0, 50.0))
            .with_opacity(1.0);
        second.id = "b2".to_string();

        let mut fade = Transition::new(TransitionKind::Fade, 2.0, 1.0);
        fade.id = "t".to_string();

        (captions, vec![first, second], vec![fade])
    }

    fn frame_at(time: TimeSec, previous: Option<&str>) -> CompositeFrame {
        let (captions, brolls, transitions) = scene();
        let resolved = resolve(time, &captions, &brolls, &transitions, previous);
        build(&resolved, &CompositeDefaults::default())
    }

    // -------------------------------------------------------------------------
    // Layer Order
    // -------------------------------------------------------------------------

    #[test]
    fn test_layer_order_is_fixed() {
        let frame = frame_at(2.5, None);

        assert_eq!(frame.layer_count(), 5);
        assert_eq!(frame.video.z_index, 0);
        assert_eq!(frame.brolls[0].clip_id, "b1");
        assert_eq!(frame.brolls[0].z_index, 1);
        assert_eq!(frame.brolls[1].z_index, 2);
        assert_eq!(frame.caption.as_ref().unwrap().z_index, 3);
        assert_eq!(frame.transition.as_ref().unwrap().z_index, 4);
    }

    #[test]
    fn test_caption_above_video_without_brolls() {
        let captions = vec![Caption::new("c", 0.0, 2.0, "Solo")];
        let resolved = resolve(1.0, &captions, &[], &[], None);
        let frame = build(&resolved, &CompositeDefaults::default());

        assert_eq!(frame.layer_count(), 2);
        assert_eq!(frame.caption.unwrap().z_index, 1);
    }

    #[test]
    fn test_empty_frame_has_only_video() {
        let frame = frame_at(9.0, None);
        assert_eq!(frame.layer_count(), 1);
        assert_eq!(frame.video.time, 9.0);
    }

    // -------------------------------------------------------------------------
    // B-roll Geometry
    // -------------------------------------------------------------------------

    #[test]
    fn test_broll_geometry_and_local_time() {
        let frame = frame_at(3.0, None);
        let layer = &frame.brolls[1];

        assert_eq!(layer.rect, FrameRect::new(50.0, 50.0, 50.0, 50.0));
        assert_eq!(layer.pixel_rect.x, 960.0);
        assert_eq!(layer.pixel_rect.height, 540.0);
        assert_eq!(layer.opacity, 1.0);
        assert_eq!(layer.local_time, 1.0);
        assert_eq!(frame.brolls[0].opacity, 0.8);
    }

    // -------------------------------------------------------------------------
    // Caption Styling
    // -------------------------------------------------------------------------

    #[test]
    fn test_caption_drop_shadow_and_layout() {
        let frame = frame_at(1.5, None);
        let caption = frame.caption.unwrap();

        assert_eq!(caption.text, "Hello");
        assert_eq!(caption.layout.anchor, VerticalPosition::Bottom);
        assert_eq!(caption.layout.y_px, 1080.0 - 32.0);
        assert_eq!(caption.layout.translate_y_percent, -100.0);
        assert_eq!(caption.layout.max_width_percent, 80.0);
        assert_eq!(caption.font.weight, 600);
        assert_eq!(caption.font.size_px, 24);
        assert_eq!(caption.shadow.to_css(), "2px 2px 4px rgba(0, 0, 0, 0.5)");
    }

    #[test]
    fn test_glow_uses_caption_color() {
        let mut caption = Caption::new("g", 0.0, 2.0, "Shine")
            .with_animation(CaptionAnimation::new(AnimationType::Glow, 1.0, 0.0));
        caption.style.color = Color::rgb(254, 240, 138);
        caption.style.position = VerticalPosition::Center;

        let resolved = resolve(0.5, &[caption], &[], &[], None);
        let layer = build(&resolved, &CompositeDefaults::default())
            .caption
            .unwrap();

        assert_eq!(
            layer.shadow.to_css(),
            "0 0 10px #FEF08A, 0 0 20px #FEF08A"
        );
        assert!(layer.animation.pulse);
        assert_eq!(layer.layout.y_px, 540.0);
        assert_eq!(layer.layout.translate_y_percent, -50.0);
    }

    #[test]
    fn test_animation_directive_tracks_delay_and_restart() {
        // Dynamic preset: slideUp 0.8 s after a 0.2 s delay, caption starts at 1.0
        let delayed = frame_at(1.1, None).caption.unwrap().animation;
        assert!(delayed.restarted);
        assert_eq!(delayed.kind, AnimationType::SlideUp);
        assert!(delayed.elapsed < 0.0);
        assert_eq!(delayed.progress, 0.0);

        let midway = frame_at(1.6, Some("cap")).caption.unwrap().animation;
        assert!(!midway.restarted);
        assert!((midway.progress - 0.5).abs() < 1e-9);

        let done = frame_at(3.0, Some("cap")).caption.unwrap().animation;
        assert_eq!(done.progress, 1.0);
    }

    // -------------------------------------------------------------------------
    // Transition Overlay
    // -------------------------------------------------------------------------

    #[test]
    fn test_transition_overlay_visual() {
        let overlay = frame_at(2.5, None).transition.unwrap();
        assert_eq!(overlay.kind, TransitionKind::Fade);
        assert_eq!(overlay.progress, 0.5);
        assert_eq!(overlay.visual, TransitionVisual::Fade { opacity: 1.0 });
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(frame_at(2.25, Some("cap")), frame_at(2.25, Some("cap")));
    }

    #[test]
    fn test_frame_json_shape() {
        let json = serde_json::to_value(frame_at(2.5, None)).unwrap();
        assert_eq!(json["caption"]["animation"]["type"], "slideUp");
        assert_eq!(json["caption"]["shadow"]["type"], "drop");
        assert_eq!(json["transition"]["visual"]["type"], "fade");
        assert_eq!(json["brolls"][0]["pixelRect"]["width"], 480.0);
    }

    #[test]
    fn test_defaults_normalize() {
        let mut defaults = CompositeDefaults {
            canvas: Canvas::new(0, 720),
            caption_max_width_percent: 250.0,
            line_height: f64::NAN,
            glow_radii_px: (12.0, 4.0),
            ..Default::default()
        };
        defaults.normalize();

        assert_eq!(defaults.canvas, Canvas::default());
        assert_eq!(defaults.caption_max_width_percent, 100.0);
        assert_eq!(defaults.line_height, 1.2);
        assert_eq!(defaults.glow_radii_px, (12.0, 12.0));
    }
}
