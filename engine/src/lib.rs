//! CaptionReel Core Library
//!
//! Timeline composition engine for captioned video edits.
//! This library owns the caption, B-roll and transition stores, resolves
//! which of them are active at a playback instant, and describes the
//! resulting composite frame for whatever presentation layer renders it.
//!
//! Decoding, transcription models and drawing are external collaborators.

pub mod core;

pub use crate::core::{
    session::{EditSession, SharedWorkspace, Workspace},
    CoreError, CoreResult,
};
