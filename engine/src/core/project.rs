//! Project Document
//!
//! A session saved as one pretty-printed JSON file. Loading runs every
//! entity back through store validation, so a hand-edited document cannot
//! smuggle in an out-of-range caption.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::{
    captions::Caption,
    fs::{atomic_write_json_pretty, read_json},
    session::EditSession,
    settings::EditorSettings,
    timeline::{BRollClip, Transition},
    CoreError, CoreResult, VideoRef,
};

/// Project document format version
pub const PROJECT_VERSION: u32 = 1;

/// Saved session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    /// Document format version (for migrations)
    pub version: u32,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub video: VideoRef,
    #[serde(default)]
    pub captions: Vec<Caption>,
    #[serde(default)]
    pub broll_clips: Vec<BRollClip>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl ProjectDocument {
    /// Creates an empty document for a video
    pub fn new(name: &str, video: VideoRef) -> Self {
        let now = Utc::now();
        Self {
            version: PROJECT_VERSION,
            name: name.to_string(),
            created_at: now,
            modified_at: now,
            video,
            captions: Vec::new(),
            broll_clips: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Captures the session's current entities
    pub fn from_session(name: &str, session: &EditSession) -> Self {
        let mut doc = Self::new(name, session.video().clone());
        doc.capture(session);
        doc
    }

    /// Replaces the stored entities with the session's and bumps `modified_at`
    pub fn capture(&mut self, session: &EditSession) {
        self.video = session.video().clone();
        self.captions = session.list_captions();
        self.broll_clips = session.list_brolls();
        self.transitions = session.list_transitions();
        self.touch();
    }

    /// Updates the modified timestamp
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Opens a session holding the document's entities
    pub fn to_session(&self, settings: EditorSettings) -> CoreResult<EditSession> {
        EditSession::restore(
            self.video.clone(),
            settings,
            self.captions.clone(),
            self.broll_clips.clone(),
            self.transitions.clone(),
        )
    }

    /// Writes the document atomically
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        atomic_write_json_pretty(path, self)?;
        info!(
            path = %path.display(),
            captions = self.captions.len(),
            brolls = self.broll_clips.len(),
            transitions = self.transitions.len(),
            "Project saved"
        );
        Ok(())
    }

    /// Reads a document, rejecting unknown format versions
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.is_file() {
            return Err(CoreError::NotFound(format!("project {}", path.display())));
        }
        let doc: Self = read_json(path)?;
        if doc.version == 0 || doc.version > PROJECT_VERSION {
            return Err(CoreError::invalid(
                "version",
                format!(
                    "unsupported project version {} (expected {})",
                    doc.version, PROJECT_VERSION
                ),
            ));
        }
        info!(path = %path.display(), name = %doc.name, "Project loaded");
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{timeline::TransitionKind, MediaRef};
    use tempfile::TempDir;

    fn session() -> EditSession {
        let mut s = EditSession::open(VideoRef::new("file:///talk.mp4", 12.0, "talk.mp4")).unwrap();
        s.add_caption_at(0.0, 1.5, "Hello").unwrap();
        s.add_caption_at(2.0, 3.25, "World").unwrap();
        s.add_broll_at_playhead(MediaRef::new("file:///b.mp4"), 4.0, 3.0)
            .unwrap();
        s.add_transition_at(Some(TransitionKind::Slide), 5.0)
            .unwrap();
        s
    }

    #[test]
    fn test_save_then_load_restores_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talk.captionreel.json");

        let original = session();
        ProjectDocument::from_session("Talk", &original)
            .save(&path)
            .unwrap();

        let doc = ProjectDocument::load(&path).unwrap();
        assert_eq!(doc.name, "Talk");
        assert_eq!(doc.version, PROJECT_VERSION);

        let restored = doc.to_session(EditorSettings::default()).unwrap();
        assert_eq!(restored.list_captions(), original.list_captions());
        assert_eq!(restored.list_brolls(), original.list_brolls());
        assert_eq!(restored.list_transitions(), original.list_transitions());
        assert_ne!(restored.id(), original.id());
    }

    #[test]
    fn test_document_json_is_camel_case() {
        let doc = ProjectDocument::from_session("Talk", &session());
        let json = serde_json::to_value(&doc).unwrap();

        assert!(json.get("createdAt").is_some());
        assert!(json.get("modifiedAt").is_some());
        assert_eq!(json["brollClips"].as_array().unwrap().len(), 1);
        assert_eq!(json["captions"][0]["startTime"], 0.0);
        assert_eq!(json["transitions"][0]["type"], "slide");
    }

    #[test]
    fn test_load_rejects_future_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.json");

        let mut doc = ProjectDocument::new("Future", VideoRef::new("v.mp4", 5.0, "v.mp4"));
        doc.version = PROJECT_VERSION + 1;
        doc.save(&path).unwrap();

        assert!(matches!(
            ProjectDocument::load(&path),
            Err(CoreError::ValidationError { field: "version", .. })
        ));
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            ProjectDocument::load(&dir.path().join("missing.json")),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_restore_clamps_hand_edited_entities() {
        let mut doc = ProjectDocument::new("Edited", VideoRef::new("v.mp4", 5.0, "v.mp4"));
        doc.captions
            .push(Caption::new("c1", 4.0, 9.0, "runs past the end"));

        let session = doc.to_session(EditorSettings::default()).unwrap();
        assert_eq!(session.find_caption("c1").unwrap().end_time, 5.0);
    }

    #[test]
    fn test_capture_touches_modified_at() {
        let mut doc = ProjectDocument::new("Talk", VideoRef::new("v.mp4", 12.0, "v.mp4"));
        let created = doc.created_at;
        std::thread::sleep(std::time::Duration::from_millis(5));

        doc.capture(&session());

        assert_eq!(doc.created_at, created);
        assert!(doc.modified_at > created);
        assert_eq!(doc.captions.len(), 2);
    }
}
