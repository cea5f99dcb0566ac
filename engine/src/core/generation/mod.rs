//! Caption Generation Module
//!
//! Boundary to the external transcription collaborator.
//!
//! Generation runs outside the session lock. A [`GenerationTicket`] taken
//! when the task starts decides whether its result may still be applied:
//! starting a newer task, cancelling, or leaving the session all make the
//! ticket stale, and a stale result is dropped without touching the stores.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{CoreResult, SessionId, TimeSec, VideoRef};

// =============================================================================
// Segments
// =============================================================================

/// One timed piece of text produced by transcription or subtitle import
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSegment {
    pub text: String,
    pub start_time: TimeSec,
    pub end_time: TimeSec,
}

impl CaptionSegment {
    pub fn new(text: &str, start_time: TimeSec, end_time: TimeSec) -> Self {
        Self {
            text: text.to_string(),
            start_time,
            end_time,
        }
    }
}

// =============================================================================
// Generator Trait
// =============================================================================

/// Input handed to a generator
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub video: VideoRef,
    /// Spoken language hint (BCP 47), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl GenerationRequest {
    pub fn new(video: VideoRef) -> Self {
        Self {
            video,
            language: None,
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }
}

/// Trait for caption generators (speech-to-text services, local models, fixtures)
#[async_trait]
pub trait CaptionGenerator: Send + Sync {
    /// Returns the generator name
    fn name(&self) -> &str;

    /// Produces caption segments for the video, ordered or unordered.
    ///
    /// Segments may reach past the video; the session clamps them.
    async fn generate(&self, request: GenerationRequest) -> CoreResult<Vec<CaptionSegment>>;
}

// =============================================================================
// Tickets
// =============================================================================

/// Token identifying one generation task within one session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTicket {
    pub session_id: SessionId,
    pub epoch: u64,
}

/// What happened to a finished generation result
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum GenerationOutcome {
    /// Captions were replaced
    Applied {
        /// Captions now in the store
        count: usize,
        /// Segments dropped because they fell outside the video or were empty
        skipped: usize,
    },
    /// The ticket was stale; nothing changed
    Discarded,
}

// =============================================================================
// Demo Generator
// =============================================================================

/// Generator returning a fixed sample transcript, for demos and tests
#[derive(Clone, Debug, Default)]
pub struct DemoCaptionGenerator {
    delay: Duration,
}

impl DemoCaptionGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates transcription latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sample_segments() -> Vec<CaptionSegment> {
        vec![
            CaptionSegment::new("Welcome to our amazing video!", 0.0, 3.0),
            CaptionSegment::new("This is where the magic happens.", 3.5, 6.5),
            CaptionSegment::new("AI-powered captions make everything better!", 7.0, 10.0),
        ]
    }
}

#[async_trait]
impl CaptionGenerator for DemoCaptionGenerator {
    fn name(&self) -> &str {
        "demo"
    }

    async fn generate(&self, request: GenerationRequest) -> CoreResult<Vec<CaptionSegment>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        tracing::debug!(video = %request.video.display_name, "Demo transcript generated");
        Ok(Self::sample_segments())
    }
}

// =============================================================================
// Tests
// =============================================================================
