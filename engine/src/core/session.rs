//! Edit Session
//!
//! [`EditSession`] owns the three entity stores for one loaded video. It is
//! created when a video is loaded and dropped on "back to upload".
//! [`Workspace`] is the shared host holding the optional active session
//! behind an async `RwLock` (one writer, many readers) and drives caption
//! generation tasks.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::core::{
    captions::{self, Caption, CaptionPatch, StyleScope, SubtitleFormat},
    generation::{
        CaptionGenerator, CaptionSegment, GenerationOutcome, GenerationRequest, GenerationTicket,
    },
    new_id,
    settings::EditorSettings,
    timeline::{
        build, resolve, BRollClip, BRollPatch, CompositeFrame, EntityStore, ResolvedState,
        TimelineEntity, Transition, TransitionKind, TransitionPatch, UpdateReport,
    },
    BRollId, CaptionId, CoreError, CoreResult, MediaRef, SessionId, TimeSec, TransitionId,
    VideoRef,
};

// =============================================================================
// Validation Warnings
// =============================================================================

/// Data-entry anomaly that is allowed but worth showing to the user
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationWarning {
    /// Two captions share time; the earlier stored one is displayed
    #[serde(rename_all = "camelCase")]
    OverlappingCaptions {
        first_id: CaptionId,
        second_id: CaptionId,
        overlap_start: TimeSec,
        overlap_end: TimeSec,
    },
    /// Two transition windows share time; only the first one is applied
    #[serde(rename_all = "camelCase")]
    OverlappingTransitions {
        first_id: TransitionId,
        second_id: TransitionId,
    },
}

impl ValidationWarning {
    /// Returns true if the warning mentions the entity
    pub fn involves(&self, id: &str) -> bool {
        match self {
            Self::OverlappingCaptions {
                first_id,
                second_id,
                ..
            }
            | Self::OverlappingTransitions {
                first_id,
                second_id,
            } => first_id == id || second_id == id,
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverlappingCaptions {
                first_id,
                second_id,
                overlap_start,
                overlap_end,
            } => write!(
                f,
                "Captions {first_id} and {second_id} overlap from {overlap_start:.3}s to {overlap_end:.3}s; only {first_id} is shown"
            ),
            Self::OverlappingTransitions {
                first_id,
                second_id,
            } => write!(
                f,
                "Transitions {first_id} and {second_id} overlap; only {first_id} is applied"
            ),
        }
    }
}

// =============================================================================
// Edit Session
// =============================================================================

/// Entity stores and generation state for one loaded video
#[derive(Clone, Debug)]
pub struct EditSession {
    id: SessionId,
    video: VideoRef,
    settings: EditorSettings,
    captions: EntityStore<Caption>,
    brolls: EntityStore<BRollClip>,
    transitions: EntityStore<Transition>,
    generation_epoch: u64,
}

impl EditSession {
    /// Opens a session for a validated video
    pub fn open(video: VideoRef) -> CoreResult<Self> {
        Self::open_with_settings(video, EditorSettings::default())
    }

    /// Opens a session whose new entities and frames follow `settings`
    pub fn open_with_settings(video: VideoRef, mut settings: EditorSettings) -> CoreResult<Self> {
        video.validate()?;
        settings.normalize();

        let duration = video.duration_sec;
        let session = Self {
            id: new_id(),
            video,
            settings,
            captions: EntityStore::new(duration),
            brolls: EntityStore::new(duration),
            transitions: EntityStore::new(duration),
            generation_epoch: 0,
        };

        info!(
            session_id = %session.id,
            video = %session.video.display_name,
            duration,
            "Edit session opened"
        );
        Ok(session)
    }

    /// Rebuilds a session from saved entities.
    ///
    /// Every entity passes through the same validation as a fresh add.
    pub fn restore(
        video: VideoRef,
        settings: EditorSettings,
        captions: Vec<Caption>,
        brolls: Vec<BRollClip>,
        transitions: Vec<Transition>,
    ) -> CoreResult<Self> {
        let mut session = Self::open_with_settings(video, settings)?;
        session.captions.replace_all(captions)?;
        session.brolls.replace_all(brolls)?;
        session.transitions.replace_all(transitions)?;
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn video(&self) -> &VideoRef {
        &self.video
    }

    pub fn video_duration(&self) -> TimeSec {
        self.video.duration_sec
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    /// Replaces the settings used for new entities and frames
    pub fn set_settings(&mut self, mut settings: EditorSettings) {
        settings.normalize();
        self.settings = settings;
    }

    pub fn captions(&self) -> &EntityStore<Caption> {
        &self.captions
    }

    pub fn brolls(&self) -> &EntityStore<BRollClip> {
        &self.brolls
    }

    pub fn transitions(&self) -> &EntityStore<Transition> {
        &self.transitions
    }

    // -------------------------------------------------------------------------
    // Captions
    // -------------------------------------------------------------------------

    /// Adds a caption, clamping it to the video
    pub fn add_caption(&mut self, caption: Caption) -> CoreResult<CaptionId> {
        let id = self.captions.add(caption)?;
        self.warn_overlaps(&id);
        Ok(id)
    }

    /// Adds a caption with the configured default style and animation
    pub fn add_caption_at(
        &mut self,
        start_time: TimeSec,
        end_time: TimeSec,
        text: &str,
    ) -> CoreResult<CaptionId> {
        let defaults = &self.settings.captions;
        let caption = Caption::create(start_time, end_time, text)
            .with_style(defaults.style.clone())
            .with_animation(defaults.animation.clone());
        self.add_caption(caption)
    }

    /// Merges a partial caption update. Unknown ids are skipped.
    pub fn update_caption(&mut self, id: &str, patch: CaptionPatch) -> UpdateReport {
        let report = self.captions.update(id, patch);
        if report.changed.iter().any(|f| *f == "startTime" || *f == "endTime") {
            self.warn_overlaps(id);
        }
        report
    }

    pub fn remove_caption(&mut self, id: &str) -> Option<Caption> {
        self.captions.remove(id)
    }

    pub fn find_caption(&self, id: &str) -> Option<&Caption> {
        self.captions.find(id)
    }

    pub fn list_captions(&self) -> Vec<Caption> {
        self.captions.list()
    }

    /// Copies the source caption's style and animation onto every caption
    pub fn apply_style_to_all(&mut self, source_id: &str) -> usize {
        self.apply_to_all(source_id, StyleScope::All)
    }

    /// Copies the chosen blocks of the source caption onto every caption.
    ///
    /// Text and timing stay untouched. Returns how many captions were
    /// updated; an unknown source updates nothing.
    pub fn apply_to_all(&mut self, source_id: &str, scope: StyleScope) -> usize {
        let Some(source) = self.captions.find(source_id).cloned() else {
            debug!(source_id, "Apply to all skipped: unknown caption");
            return 0;
        };

        let mut count = 0;
        self.captions.for_each_mut(|caption| {
            if scope.includes_style() {
                caption.style = source.style.clone();
            }
            if scope.includes_animation() {
                caption.animation = source.animation.clone();
            }
            count += 1;
        });

        info!(source_id, ?scope, count, "Applied caption style to all");
        count
    }

    /// Replaces every caption with the given segments in one swap.
    ///
    /// Segments are clamped to the video; empty or out-of-range segments
    /// are skipped. Returns `(inserted, skipped)`.
    pub fn insert_segments(&mut self, segments: Vec<CaptionSegment>) -> CoreResult<(usize, usize)> {
        let duration = self.video_duration();
        let defaults = &self.settings.captions;
        let total = segments.len();

        let captions: Vec<Caption> = segments
            .into_iter()
            .filter_map(|segment| {
                let mut caption =
                    Caption::create(segment.start_time, segment.end_time, &segment.text)
                        .with_style(defaults.style.clone())
                        .with_animation(defaults.animation.clone());
                match caption.normalize(duration) {
                    Ok(()) => Some(caption),
                    Err(e) => {
                        warn!(
                            start = segment.start_time,
                            end = segment.end_time,
                            "Skipping caption segment: {}",
                            e
                        );
                        None
                    }
                }
            })
            .collect();

        let inserted = self.captions.replace_all(captions)?;
        for warning in self.overlap_warnings() {
            warn!("{}", warning);
        }
        Ok((inserted, total - inserted))
    }

    /// Subtitle text for the current captions
    pub fn export_subtitles(&self, format: SubtitleFormat) -> String {
        captions::export(self.captions.as_slice(), format)
    }

    // -------------------------------------------------------------------------
    // B-roll
    // -------------------------------------------------------------------------

    pub fn add_broll(&mut self, clip: BRollClip) -> CoreResult<BRollId> {
        self.brolls.add(clip)
    }

    /// Places media at the playhead with the configured default rectangle
    pub fn add_broll_at_playhead(
        &mut self,
        source: MediaRef,
        playhead: TimeSec,
        media_duration: TimeSec,
    ) -> CoreResult<BRollId> {
        let defaults = &self.settings.broll;
        let clip = BRollClip::at_playhead(source, playhead, media_duration, self.video_duration())
            .with_position(defaults.position)
            .with_opacity(defaults.opacity);
        self.add_broll(clip)
    }

    pub fn update_broll(&mut self, id: &str, patch: BRollPatch) -> UpdateReport {
        self.brolls.update(id, patch)
    }

    pub fn remove_broll(&mut self, id: &str) -> Option<BRollClip> {
        self.brolls.remove(id)
    }

    /// Moves a clip in the stack; later clips draw on top. Unknown ids
    /// return false.
    pub fn reorder_broll(&mut self, id: &str, index: usize) -> CoreResult<bool> {
        self.brolls.move_to(id, index)
    }

    pub fn find_broll(&self, id: &str) -> Option<&BRollClip> {
        self.brolls.find(id)
    }

    pub fn list_brolls(&self) -> Vec<BRollClip> {
        self.brolls.list()
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    pub fn add_transition(&mut self, transition: Transition) -> CoreResult<TransitionId> {
        let id = self.transitions.add(transition)?;
        self.warn_overlaps(&id);
        Ok(id)
    }

    /// Adds a transition of `kind` (or the configured default) with its
    /// default duration
    pub fn add_transition_at(
        &mut self,
        kind: Option<TransitionKind>,
        start_time: TimeSec,
    ) -> CoreResult<TransitionId> {
        let kind = kind.unwrap_or(self.settings.transitions.kind);
        self.add_transition(Transition::with_default_duration(kind, start_time))
    }

    pub fn update_transition(&mut self, id: &str, patch: TransitionPatch) -> UpdateReport {
        let report = self.transitions.update(id, patch);
        if report
            .changed
            .iter()
            .any(|f| *f == "startTime" || *f == "duration")
        {
            self.warn_overlaps(id);
        }
        report
    }

    pub fn remove_transition(&mut self, id: &str) -> Option<Transition> {
        self.transitions.remove(id)
    }

    pub fn find_transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.find(id)
    }

    pub fn list_transitions(&self) -> Vec<Transition> {
        self.transitions.list()
    }

    // -------------------------------------------------------------------------
    // Overlap Warnings
    // -------------------------------------------------------------------------

    /// Lists overlapping captions and overlapping transition windows
    pub fn overlap_warnings(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        let captions = self.captions.as_slice();
        for (i, first) in captions.iter().enumerate() {
            for second in &captions[i + 1..] {
                // Sorted by start: nothing further can overlap `first`
                if second.start_time >= first.end_time {
                    break;
                }
                if first.overlaps(second) {
                    warnings.push(ValidationWarning::OverlappingCaptions {
                        first_id: first.id.clone(),
                        second_id: second.id.clone(),
                        overlap_start: second.start_time,
                        overlap_end: first.end_time.min(second.end_time),
                    });
                }
            }
        }

        let transitions = self.transitions.as_slice();
        for (i, first) in transitions.iter().enumerate() {
            for second in &transitions[i + 1..] {
                if second.start_time > first.end_time() {
                    break;
                }
                if first.overlaps(second) {
                    warnings.push(ValidationWarning::OverlappingTransitions {
                        first_id: first.id.clone(),
                        second_id: second.id.clone(),
                    });
                }
            }
        }

        warnings
    }

    fn warn_overlaps(&self, id: &str) {
        for warning in self.overlap_warnings().iter().filter(|w| w.involves(id)) {
            warn!("{}", warning);
        }
    }

    // -------------------------------------------------------------------------
    // Generation
    // -------------------------------------------------------------------------

    /// Starts a generation task, superseding any running one
    pub fn begin_generation(&mut self) -> GenerationTicket {
        self.generation_epoch += 1;
        debug!(session_id = %self.id, epoch = self.generation_epoch, "Generation started");
        GenerationTicket {
            session_id: self.id.clone(),
            epoch: self.generation_epoch,
        }
    }

    /// Makes every outstanding ticket stale
    pub fn cancel_generation(&mut self) {
        self.generation_epoch += 1;
        debug!(session_id = %self.id, "Generation cancelled");
    }

    /// Returns true if a result for `ticket` may still be applied
    pub fn is_current(&self, ticket: &GenerationTicket) -> bool {
        ticket.session_id == self.id && ticket.epoch == self.generation_epoch
    }

    /// Applies a finished generation result.
    ///
    /// Stale tickets are discarded whatever the result. A failure leaves
    /// the stores untouched and is returned to the caller; a success
    /// replaces every caption in one swap.
    pub fn apply_generation(
        &mut self,
        ticket: &GenerationTicket,
        result: CoreResult<Vec<CaptionSegment>>,
    ) -> CoreResult<GenerationOutcome> {
        if !self.is_current(ticket) {
            warn!(
                session_id = %self.id,
                ticket_epoch = ticket.epoch,
                "Discarding stale generation result"
            );
            return Ok(GenerationOutcome::Discarded);
        }

        // The ticket is spent whatever the result
        self.generation_epoch += 1;

        let segments = result?;
        let (count, skipped) = self.insert_segments(segments)?;
        info!(session_id = %self.id, count, skipped, "Generated captions applied");
        Ok(GenerationOutcome::Applied { count, skipped })
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    /// Resolves the active entities at `time`
    pub fn resolve(&self, time: TimeSec, previous_caption_id: Option<&str>) -> ResolvedState {
        resolve(
            time,
            self.captions.as_slice(),
            self.brolls.as_slice(),
            self.transitions.as_slice(),
            previous_caption_id,
        )
    }

    /// Builds the composite frame at `time` with the session's defaults
    pub fn frame(&self, time: TimeSec, previous_caption_id: Option<&str>) -> CompositeFrame {
        build(
            &self.resolve(time, previous_caption_id),
            &self.settings.composite,
        )
    }
}

// =============================================================================
// Workspace
// =============================================================================

/// Shared host of the optional active session
#[derive(Debug, Default)]
pub struct Workspace {
    session: RwLock<Option<EditSession>>,
    settings: RwLock<EditorSettings>,
}

/// Workspace shared across tasks
pub type SharedWorkspace = Arc<Workspace>;

impl Workspace {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            session: RwLock::new(None),
            settings: RwLock::new(settings),
        }
    }

    pub fn shared(settings: EditorSettings) -> SharedWorkspace {
        Arc::new(Self::new(settings))
    }

    pub async fn settings(&self) -> EditorSettings {
        self.settings.read().await.clone()
    }

    /// Replaces the settings and hands them to the active session
    pub async fn update_settings(&self, mut settings: EditorSettings) {
        settings.normalize();
        if let Some(session) = self.session.write().await.as_mut() {
            session.set_settings(settings.clone());
        }
        *self.settings.write().await = settings;
    }

    /// Opens a session for `video`, replacing any active one
    pub async fn load_video(&self, video: VideoRef) -> CoreResult<SessionId> {
        let settings = self.settings().await;
        let session = EditSession::open_with_settings(video, settings)?;
        let id = session.id().to_string();

        let previous = self.session.write().await.replace(session);
        if let Some(previous) = previous {
            info!(session_id = %previous.id(), "Previous edit session closed");
        }
        Ok(id)
    }

    /// Tears the active session down. Returns the closed session's id.
    pub async fn back_to_upload(&self) -> Option<SessionId> {
        let closed = self.session.write().await.take()?;
        info!(session_id = %closed.id(), "Edit session closed");
        Some(closed.id)
    }

    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    /// Puts a prepared session in place, replacing any active one
    pub async fn install(&self, session: EditSession) -> SessionId {
        let id = session.id().to_string();
        *self.session.write().await = Some(session);
        id
    }

    /// Runs `f` with shared access to the active session
    pub async fn read<T>(&self, f: impl FnOnce(&EditSession) -> T) -> CoreResult<T> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(CoreError::VideoNotLoaded)?;
        Ok(f(session))
    }

    /// Runs `f` with exclusive access to the active session
    pub async fn write<T>(&self, f: impl FnOnce(&mut EditSession) -> T) -> CoreResult<T> {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(CoreError::VideoNotLoaded)?;
        Ok(f(session))
    }

    /// Composite frame of the active session
    pub async fn frame(
        &self,
        time: TimeSec,
        previous_caption_id: Option<&str>,
    ) -> CoreResult<CompositeFrame> {
        self.read(|s| s.frame(time, previous_caption_id)).await
    }

    /// Runs a generation task against the active session.
    ///
    /// The lock is released while the generator runs, so edits and frame
    /// resolution continue meanwhile. The result is applied only if the
    /// task was not superseded, cancelled, or orphaned by leaving the
    /// session.
    pub async fn generate_captions(
        &self,
        generator: &dyn CaptionGenerator,
    ) -> CoreResult<GenerationOutcome> {
        let settings = self.settings().await;
        let (ticket, request) = self
            .write(|s| {
                let mut request = GenerationRequest::new(s.video().clone());
                request.language = settings.generation.language.clone();
                (s.begin_generation(), request)
            })
            .await?;

        info!(generator = generator.name(), epoch = ticket.epoch, "Generating captions");

        let timeout_secs = settings.generation.timeout_secs;
        let result =
            match tokio::time::timeout(Duration::from_secs(timeout_secs), generator.generate(request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(CoreError::GenerationTimeout(timeout_secs)),
            };

        let mut guard = self.session.write().await;
        let outcome = match guard.as_mut() {
            Some(session) => session.apply_generation(&ticket, result),
            None => {
                warn!("Discarding generation result: no active session");
                Ok(GenerationOutcome::Discarded)
            }
        };

        match &outcome {
            Err(e) if e.is_external() => {
                error!(generator = generator.name(), "Caption generation failed: {}", e)
            }
            Err(e) => warn!(generator = generator.name(), "Generated captions rejected: {}", e),
            Ok(_) => {}
        }
        outcome
    }

    /// Supersedes any running generation task
    pub async fn cancel_generation(&self) -> CoreResult<()> {
        self.write(|s| s.cancel_generation()).await
    }
}

// =============================================================================
// Tests
// =============================================================================
