//! Settings Persistence System
//!
//! Provides persistent editor settings with:
//! - Atomic file writes (temp file + rename)
//! - Tolerant normalization instead of hard validation failures
//! - An advisory lock so two processes never interleave writes
//!
//! Storage location: {config_dir}/captionreel/settings.json

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{
    captions::{CaptionAnimation, CaptionStyle, SubtitleFormat, MAX_FONT_SIZE, MIN_FONT_SIZE},
    fs::{atomic_write_json_pretty, read_json, with_file_lock},
    timeline::{CompositeDefaults, FrameRect, TransitionKind},
    CoreError, CoreResult,
};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Application directory under the platform config dir
pub const APP_DIR_NAME: &str = "captionreel";

// =============================================================================
// Settings Sections
// =============================================================================

/// Editor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditorSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub captions: CaptionDefaults,

    #[serde(default)]
    pub broll: BRollDefaults,

    #[serde(default)]
    pub transitions: TransitionDefaults,

    #[serde(default)]
    pub composite: CompositeDefaults,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub export: ExportSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            captions: CaptionDefaults::default(),
            broll: BRollDefaults::default(),
            transitions: TransitionDefaults::default(),
            composite: CompositeDefaults::default(),
            generation: GenerationSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

impl EditorSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Bad values are corrected rather than rejected, so an old or
    /// hand-edited file never blocks startup.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        let style = &mut self.captions.style;
        style.font_size = style.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE);
        if style.font_family.trim().is_empty() {
            style.font_family = CaptionStyle::default().font_family;
        }
        let animation = &mut self.captions.animation;
        animation.duration = clamp_f64(animation.duration, 0.0, 10.0);
        animation.delay = clamp_f64(animation.delay, 0.0, 10.0);

        if self.broll.position.validate().is_err() {
            self.broll.position = FrameRect::default();
        }
        self.broll.opacity = clamp_f64(self.broll.opacity, 0.0, 1.0);

        self.composite.normalize();

        self.generation.timeout_secs = self.generation.timeout_secs.clamp(1, 3600);
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

/// Style and animation given to manually added captions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaptionDefaults {
    #[serde(default)]
    pub style: CaptionStyle,
    #[serde(default)]
    pub animation: CaptionAnimation,
}

/// Placement given to newly added B-roll clips
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BRollDefaults {
    #[serde(default)]
    pub position: FrameRect,
    #[serde(default = "default_broll_opacity")]
    pub opacity: f64,
}

fn default_broll_opacity() -> f64 {
    0.8
}

impl Default for BRollDefaults {
    fn default() -> Self {
        Self {
            position: FrameRect::default(),
            opacity: default_broll_opacity(),
        }
    }
}

/// Transition kind used when none is specified
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDefaults {
    #[serde(default)]
    pub kind: TransitionKind,
}

/// Caption generation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Seconds before a generation task is abandoned
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Spoken language hint passed to the generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn default_generation_timeout() -> u64 {
    60
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_generation_timeout(),
            language: None,
        }
    }
}

/// Subtitle export settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    #[serde(default)]
    pub default_format: SubtitleFormat,
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Loads and saves [`EditorSettings`]
#[derive(Debug, Clone)]
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager storing into the given directory
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            settings_path: config_dir.join(SETTINGS_FILE),
        }
    }

    /// Create a settings manager for an explicit settings file
    pub fn at_path(settings_path: PathBuf) -> Self {
        Self { settings_path }
    }

    /// Settings manager under the platform config directory
    pub fn from_default_location() -> CoreResult<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| CoreError::Internal("No config directory on this platform".into()))?;
        Ok(Self::new(base.join(APP_DIR_NAME)))
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> EditorSettings {
        let result = with_file_lock(&self.lock_path(), false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(EditorSettings::default());
            }

            let mut settings: EditorSettings = read_json(&self.settings_path)?;
            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
            }
            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                EditorSettings::default()
            }
        }
    }

    /// Normalize and save settings atomically. Returns what was written.
    pub fn save(&self, settings: &EditorSettings) -> CoreResult<EditorSettings> {
        with_file_lock(&self.lock_path(), true, || {
            let mut normalized = settings.clone();
            normalized.normalize();
            atomic_write_json_pretty(&self.settings_path, &normalized)?;
            info!("Settings saved to {}", self.settings_path.display());
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<EditorSettings> {
        with_file_lock(&self.lock_path(), true, || {
            if self.settings_path.exists() {
                std::fs::remove_file(&self.settings_path)?;
                info!("Settings file deleted");
            }
            Ok(EditorSettings::default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::Color;
    use tempfile::TempDir;

    // ============================================================
    // Defaults
    // ============================================================

    #[test]
    fn test_default_settings() {
        let settings = EditorSettings::default();

        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.captions.style.font_family, "Inter");
        assert_eq!(settings.captions.style.font_size, 24);
        assert_eq!(settings.broll.position, FrameRect::new(20.0, 20.0, 30.0, 30.0));
        assert_eq!(settings.broll.opacity, 0.8);
        assert_eq!(settings.transitions.kind, TransitionKind::Fade);
        assert_eq!(settings.generation.timeout_secs, 60);
        assert_eq!(settings.export.default_format, SubtitleFormat::Srt);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{"generation":{"timeoutSecs":5},"export":{"defaultFormat":"vtt"}}"#;
        let settings: EditorSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.generation.timeout_secs, 5);
        assert_eq!(settings.export.default_format, SubtitleFormat::Vtt);
        assert_eq!(settings.composite, CompositeDefaults::default());
    }

    // ============================================================
    // Normalization
    // ============================================================

    #[test]
    fn test_normalize_clamps_values() {
        let mut settings = EditorSettings {
            version: 0,
            ..Default::default()
        };
        settings.captions.style.font_size = 9000;
        settings.captions.style.font_family = "  ".to_string();
        settings.captions.animation.delay = f64::NAN;
        settings.broll.position = FrameRect::new(-5.0, 0.0, 10.0, 10.0);
        settings.broll.opacity = 3.0;
        settings.generation.timeout_secs = 0;

        settings.normalize();

        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.captions.style.font_size, MAX_FONT_SIZE);
        assert_eq!(settings.captions.style.font_family, "Inter");
        assert_eq!(settings.captions.animation.delay, 0.0);
        assert_eq!(settings.broll.position, FrameRect::default());
        assert_eq!(settings.broll.opacity, 1.0);
        assert_eq!(settings.generation.timeout_secs, 1);
    }

    // ============================================================
    // Manager
    // ============================================================

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        assert_eq!(manager.load(), EditorSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().join("captionreel"));

        let mut settings = EditorSettings::default();
        settings.captions.style.color = Color::rgb(254, 240, 138);
        settings.transitions.kind = TransitionKind::Dissolve;
        settings.generation.timeout_secs = 15;

        let saved = manager.save(&settings).unwrap();
        assert_eq!(saved, settings);

        let loaded = manager.load();
        assert_eq!(loaded.captions.style.color, Color::rgb(254, 240, 138));
        assert_eq!(loaded.transitions.kind, TransitionKind::Dissolve);
        assert_eq!(loaded.generation.timeout_secs, 15);
    }

    #[test]
    fn test_save_normalizes() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());

        let mut settings = EditorSettings::default();
        settings.broll.opacity = -1.0;
        let saved = manager.save(&settings).unwrap();

        assert_eq!(saved.broll.opacity, 0.0);
        assert_eq!(manager.load().broll.opacity, 0.0);
    }

    #[test]
    fn test_corrupted_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        std::fs::write(manager.settings_path(), "{ not json").unwrap();

        assert_eq!(manager.load(), EditorSettings::default());
    }

    #[test]
    fn test_reset_deletes_file() {
        let dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(dir.path().to_path_buf());
        manager.save(&EditorSettings::default()).unwrap();
        assert!(manager.settings_path().exists());

        let reset = manager.reset().unwrap();
        assert_eq!(reset, EditorSettings::default());
        assert!(!manager.settings_path().exists());
    }
}
