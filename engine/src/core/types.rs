//! CaptionReel Core Type Definitions
//!
//! Defines fundamental types used throughout the project.

use serde::{Deserialize, Serialize};

use super::{CoreError, CoreResult};

// =============================================================================
// ID Types
// =============================================================================

/// Caption unique identifier (ULID unless supplied by the caller)
pub type CaptionId = String;

/// B-roll clip unique identifier (ULID unless supplied by the caller)
pub type BRollId = String;

/// Transition unique identifier (ULID unless supplied by the caller)
pub type TransitionId = String;

/// Edit session unique identifier (ULID)
pub type SessionId = String;

/// Generates a fresh entity identifier.
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

// =============================================================================
// Time Types
// =============================================================================

/// Time in seconds (floating point)
pub type TimeSec = f64;

/// Returns true when `value` can be used as a timeline position.
pub fn is_valid_time_sec(value: TimeSec) -> bool {
    value.is_finite() && value >= 0.0
}

// =============================================================================
// Media References
// =============================================================================

/// The main video handed over by the upload collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRef {
    /// Opaque source reference (URL, path, object handle)
    pub source: String,
    /// Duration in seconds
    pub duration_sec: TimeSec,
    /// Name shown in the editor
    pub display_name: String,
}

impl VideoRef {
    pub fn new(source: &str, duration_sec: TimeSec, display_name: &str) -> Self {
        Self {
            source: source.to_string(),
            duration_sec,
            display_name: display_name.to_string(),
        }
    }

    /// Checks that the video can back an edit session.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.duration_sec.is_finite() || self.duration_sec <= 0.0 {
            return Err(CoreError::InvalidVideo(format!(
                "duration must be a finite positive number, got {}",
                self.duration_sec
            )));
        }
        if self.source.trim().is_empty() {
            return Err(CoreError::InvalidVideo("source is empty".to_string()));
        }
        Ok(())
    }
}

/// Secondary media (B-roll) reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    /// Opaque source reference
    pub uri: String,
    /// Original file name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl MediaRef {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
