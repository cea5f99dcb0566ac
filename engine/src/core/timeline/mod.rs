//! Timeline Module
//!
//! Entity stores, the timeline resolver and the composite state builder.
//!
//! ```text
//! playback time ──▶ resolve() ──▶ ResolvedState ──▶ build() ──▶ CompositeFrame
//!                      ▲
//!        EntityStore<Caption | BRollClip | Transition> snapshots
//! ```

mod composite;
mod models;
mod resolver;
mod store;
mod transitions;

pub use composite::{
    build, AnimationDirective, BRollLayer, CaptionLayer, CaptionLayout, CompositeDefaults,
    CompositeFrame, DropShadow, FontSpec, TextShadow, TransitionOverlay, VideoLayer,
};
pub use models::{
    BRollClip, BRollPatch, Canvas, FrameRect, PixelRect, RectPreset, Transition, TransitionKind,
    TransitionPatch,
};
pub use resolver::{resolve, ActiveCaption, ActiveTransition, PlaybackCursor, ResolvedState};
pub use store::{
    clamp_interval, non_negative_seconds, EntityStore, FieldRejection, PatchOutcome, StoreOrder,
    TimelineEntity, UpdateReport,
};
pub use transitions::{progress, CurveParams, TransitionVisual};

pub(crate) use store::patch_interval;
