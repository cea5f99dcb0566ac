//! CaptionReel Error Definitions
//!
//! Defines error types used throughout the project.

use thiserror::Error;

use super::TimeSec;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("No video loaded")]
    VideoNotLoaded,

    #[error("Invalid video: {0}")]
    InvalidVideo(String),

    // =========================================================================
    // Entity Errors
    // =========================================================================
    #[error("Invalid {field}: {message}")]
    ValidationError {
        field: &'static str,
        message: String,
    },

    #[error("Invalid time range: {0}~{1} seconds")]
    InvalidTimeRange(TimeSec, TimeSec),

    #[error("Not found: {0}")]
    NotFound(String),

    // =========================================================================
    // Generation Errors
    // =========================================================================
    #[error("Caption generation failed: {0}")]
    GenerationFailed(String),

    #[error("Caption generation timed out after {0} seconds")]
    GenerationTimeout(u64),

    #[error("Caption generation result is stale and was discarded")]
    StaleGeneration,

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Subtitle parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Shorthand for a field validation failure
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field,
            message: message.into(),
        }
    }

    /// Message shown once to the user for a failed operation
    pub fn to_user_message(&self) -> String {
        match self {
            Self::GenerationFailed(_) | Self::GenerationTimeout(_) => {
                "Failed to generate captions. Please try again.".to_string()
            }
            Self::InvalidVideo(_) => "Failed to process video file. Please try again.".to_string(),
            _ => self.to_string(),
        }
    }

    /// Returns true for failures raised by an external collaborator
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::GenerationFailed(_) | Self::GenerationTimeout(_) | Self::ParseError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_message() {
        let err = CoreError::invalid("opacity", "must be within 0..=1");
        assert_eq!(err.to_string(), "Invalid opacity: must be within 0..=1");
    }

    #[test]
    fn test_user_message_hides_collaborator_detail() {
        let err = CoreError::GenerationFailed("HTTP 502 from upstream".to_string());
        assert_eq!(
            err.to_user_message(),
            "Failed to generate captions. Please try again."
        );
        assert!(err.is_external());
        assert!(!CoreError::VideoNotLoaded.is_external());
    }
}
