//! CaptionReel Core Engine
//!
//! Core composition module.
//! Handles entity storage, timeline resolution, composite frame building,
//! subtitle export and the session lifecycle.

pub mod captions;
pub mod color;
pub mod fs;
pub mod generation;
pub mod project;
pub mod session;
pub mod settings;
pub mod timecode;
pub mod timeline;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
