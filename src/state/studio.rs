//! Studio orchestrator
//!
//! Single owner of the mutable session: the original/processed buffer pair,
//! the current download artifact, history, playback and the persisted
//! snapshot. Every flow goes through an explicit method here.
//!
//! Generation requests are tracked with monotonically increasing
//! [`OperationToken`]s. Only the most recently started operation may install
//! its result; anything older is discarded on arrival.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::engine::{
    apply_edits, decode_audio_file, encode_buffer, AudioBuffer, AudioSink, EditConfig, EditField,
    NullSink, PlaybackEngine,
};
use crate::error::{Result, SuaraError};
use crate::service::model::{
    GeneratedAudio, GenerationService, MelodyRequest, MusicGenre, MusicMood, SpeechRequest,
    TransformRequest,
};
use crate::state::history::{ArtifactHandle, ArtifactRegistry, History, HistoryItem};
use crate::state::session::{ActiveTab, BlockUpdate, MelodyConfig, ScriptBlock, SessionSnapshot};
use crate::state::store::{load_session, save_session, KeyValueStore};

const UPLOAD_TITLE_CHARS: usize = 25;
const TRANSFORM_TITLE_CHARS: usize = 15;

// ============================================================================
// Titles
// ============================================================================

pub fn script_title(lines: usize) -> String {
    format!("Percakapan ({} baris)", lines)
}

pub fn melody_title(genre: MusicGenre, mood: MusicMood) -> String {
    format!("Melodi {} {}", genre, mood)
}

/// File name, shortened to 25 characters plus an ellipsis
pub fn upload_title(file_name: &str) -> String {
    if file_name.chars().count() > UPLOAD_TITLE_CHARS {
        let head: String = file_name.chars().take(UPLOAD_TITLE_CHARS).collect();
        format!("{}...", head)
    } else {
        file_name.to_string()
    }
}

pub fn transform_title(instruction: &str) -> String {
    let head: String = instruction.chars().take(TRANSFORM_TITLE_CHARS).collect();
    format!("Mod: {}...", head)
}

// ============================================================================
// Studio
// ============================================================================

/// Identifies one in-flight generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationToken(u64);

impl OperationToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

pub struct Studio<S: AudioSink = NullSink> {
    session: SessionSnapshot,
    store: Box<dyn KeyValueStore>,
    history: History,
    artifacts: ArtifactRegistry,
    /// Buffer as produced by the last generation/upload, never edited
    original: Option<Arc<AudioBuffer>>,
    /// `original` with the current edits applied
    processed: Option<Arc<AudioBuffer>>,
    /// WAV of `processed`, offered for download
    current_artifact: Option<ArtifactHandle>,
    current_item: Option<String>,
    current_file_name: Option<String>,
    playback: PlaybackEngine<S>,
    last_token: u64,
    pending: Option<OperationToken>,
    last_error: Option<String>,
}

impl Studio<NullSink> {
    /// Open a headless studio on `store`, restoring the saved session
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        Self::with_sink(store, NullSink)
    }
}

impl<S: AudioSink> Studio<S> {
    pub fn with_sink(store: Box<dyn KeyValueStore>, sink: S) -> Self {
        let session = load_session(store.as_ref());
        debug!(tab = %session.active_tab, blocks = session.script_blocks.len(), "session loaded");
        Self {
            session,
            store,
            history: History::default(),
            artifacts: ArtifactRegistry::new(),
            original: None,
            processed: None,
            current_artifact: None,
            current_item: None,
            current_file_name: None,
            playback: PlaybackEngine::new(sink),
            last_token: 0,
            pending: None,
            last_error: None,
        }
    }

    // ------------------------------------------------------------------------
    // Session state
    // ------------------------------------------------------------------------

    pub fn session(&self) -> &SessionSnapshot {
        &self.session
    }

    pub fn active_tab(&self) -> ActiveTab {
        self.session.active_tab
    }

    pub fn set_active_tab(&mut self, tab: ActiveTab) {
        self.session.active_tab = tab;
        self.persist();
    }

    pub fn set_script_blocks(&mut self, blocks: Vec<ScriptBlock>) {
        self.session.script_blocks = blocks;
        self.persist();
    }

    /// Append an empty block and return its id
    pub fn add_block(&mut self) -> String {
        let id = self.session.add_block().id.clone();
        self.persist();
        id
    }

    pub fn remove_block(&mut self, id: &str) -> bool {
        let removed = self.session.remove_block(id);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn update_block(&mut self, id: &str, update: BlockUpdate) -> bool {
        let updated = self.session.update_block(id, update);
        if updated {
            self.persist();
        }
        updated
    }

    pub fn set_melody_config(&mut self, config: MelodyConfig) {
        self.session.melody_config = config;
        self.persist();
    }

    /// Return the persisted session to its defaults
    pub fn reset_session(&mut self) -> Result<()> {
        self.session = SessionSnapshot::default();
        self.persist();
        self.reprocess()
    }

    fn persist(&mut self) {
        if let Err(e) = save_session(self.store.as_mut(), &self.session) {
            warn!(error = %e, "failed to save session");
        }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    // ------------------------------------------------------------------------
    // Operation tracking
    // ------------------------------------------------------------------------

    /// Start a new operation, superseding any still in flight
    pub fn begin_operation(&mut self) -> OperationToken {
        self.last_token += 1;
        let token = OperationToken(self.last_token);
        if let Some(previous) = self.pending.replace(token) {
            debug!(previous = previous.0, "operation superseded");
        }
        self.last_error = None;
        debug!(token = token.0, "operation started");
        token
    }

    pub fn is_generating(&self) -> bool {
        self.pending.is_some()
    }

    /// User-facing message of the last failed operation
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn accept(&mut self, token: OperationToken) -> bool {
        if self.pending != Some(token) {
            warn!(
                token = token.0,
                current = ?self.pending.map(|t| t.0),
                "discarding stale completion"
            );
            return false;
        }
        self.pending = None;
        true
    }

    fn fail(&mut self, error: SuaraError) -> SuaraError {
        warn!(code = error.error_code(), error = %error, "operation failed");
        self.last_error = Some(error.friendly_message());
        error
    }

    /// Deliver the service result for `token`
    ///
    /// Returns `Ok(false)` if a newer operation has started since, in which
    /// case nothing changes. On failure the previous buffer and history stay
    /// as they were.
    pub fn complete_generation(
        &mut self,
        token: OperationToken,
        kind: ActiveTab,
        title: impl Into<String>,
        result: Result<GeneratedAudio>,
    ) -> Result<bool> {
        let decoded = result.and_then(|audio| audio.decode());
        self.complete_with_buffer(token, kind, title, decoded)
    }

    /// Deliver an already decoded buffer for `token`
    pub fn complete_with_buffer(
        &mut self,
        token: OperationToken,
        kind: ActiveTab,
        title: impl Into<String>,
        result: Result<AudioBuffer>,
    ) -> Result<bool> {
        if !self.accept(token) {
            return Ok(false);
        }
        match result {
            Ok(buffer) => {
                self.install(buffer, kind, title.into())?;
                Ok(true)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn install(&mut self, buffer: AudioBuffer, kind: ActiveTab, title: String) -> Result<()> {
        self.playback.stop();

        let buffer = Arc::new(buffer);
        let artifact = self.artifacts.register(encode_buffer(&buffer));
        self.artifacts.retain(&artifact)?;

        let item = HistoryItem::new(kind, title, artifact.clone(), Arc::clone(&buffer));
        info!(
            id = %item.id,
            kind = %kind,
            title = %item.title,
            duration = buffer.duration_secs(),
            "audio ready"
        );
        self.current_item = Some(item.id.clone());
        self.history.push(item, &mut self.artifacts);
        self.replace_current_artifact(Some(artifact));

        self.original = Some(Arc::clone(&buffer));
        self.processed = Some(Arc::clone(&buffer));
        self.playback.load(buffer);

        self.session.edit_config = EditConfig::default();
        self.persist();
        Ok(())
    }

    fn replace_current_artifact(&mut self, artifact: Option<ArtifactHandle>) {
        if let Some(old) = std::mem::replace(&mut self.current_artifact, artifact) {
            self.artifacts.release(&old);
        }
    }

    // ------------------------------------------------------------------------
    // Flows
    // ------------------------------------------------------------------------

    /// Generate speech or melody for the active tab
    pub fn generate(&mut self, service: &dyn GenerationService) -> Result<()> {
        let tab = self.session.active_tab;
        let (token, title, result) = match tab {
            ActiveTab::Script => {
                let request = match SpeechRequest::from_blocks(&self.session.script_blocks) {
                    Ok(request) => request,
                    Err(e) => return Err(self.fail(e)),
                };
                let token = self.begin_operation();
                debug!(service = service.name(), lines = request.lines.len(), "requesting speech");
                (token, script_title(request.lines.len()), service.generate_speech(&request))
            }
            ActiveTab::Melody => {
                let request = match MelodyRequest::from_config(&self.session.melody_config) {
                    Ok(request) => request,
                    Err(e) => return Err(self.fail(e)),
                };
                let token = self.begin_operation();
                debug!(service = service.name(), "requesting melody");
                (
                    token,
                    melody_title(request.genre, request.mood),
                    service.generate_melody(&request),
                )
            }
            ActiveTab::Upload => {
                return Err(self.fail(SuaraError::InvalidParameter {
                    param: "tab".to_string(),
                    value: tab.to_string(),
                    expected: "script or melody".to_string(),
                }))
            }
        };
        self.complete_generation(token, tab, title, result)
            .map(|_| ())
    }

    /// Decode an uploaded file and make it the current audio
    ///
    /// A file the decoder rejects leaves the current buffer, playback and
    /// history untouched.
    pub fn upload(&mut self, bytes: &[u8], file_name: &str) -> Result<()> {
        let token = self.begin_operation();
        let decoded = decode_audio_file(bytes);
        if decoded.is_ok() {
            self.current_file_name = Some(file_name.to_string());
        }
        self.complete_with_buffer(token, ActiveTab::Upload, upload_title(file_name), decoded)
            .map(|_| ())
    }

    /// Restyle the processed buffer, keeping current trims
    pub fn transform(&mut self, service: &dyn GenerationService, instruction: &str) -> Result<()> {
        let Some(source) = self.processed.clone() else {
            return Err(self.fail(SuaraError::NoAudioLoaded));
        };
        let request = match TransformRequest::from_buffer(&source, instruction) {
            Ok(request) => request,
            Err(e) => return Err(self.fail(e)),
        };

        let token = self.begin_operation();
        self.playback.stop();
        debug!(service = service.name(), instruction = %request.instruction, "requesting transform");
        let result = service.transform_audio(&request);
        self.complete_generation(
            token,
            ActiveTab::Upload,
            transform_title(&request.instruction),
            result,
        )
        .map(|_| ())
    }

    /// Change one edit control
    ///
    /// Returns `Ok(false)` when the value is rejected (a trim that would
    /// remove the whole buffer). Without loaded audio the value is only
    /// stored.
    pub fn set_edit(&mut self, field: EditField, value: f64) -> Result<bool> {
        let duration = self
            .original
            .as_ref()
            .map(|b| b.duration_secs())
            .unwrap_or(f64::INFINITY);

        if !self.session.edit_config.set(field, value, duration) {
            debug!(%field, value, duration, "edit rejected");
            return Ok(false);
        }
        self.persist();
        self.reprocess()?;
        Ok(true)
    }

    /// Re-derive the processed buffer from the original
    fn reprocess(&mut self) -> Result<()> {
        let Some(original) = self.original.clone() else {
            return Ok(());
        };
        let edits = self.session.edit_config;

        let processed = if edits.has_edits() {
            Arc::new(apply_edits(&original, &edits))
        } else {
            let already_original = self
                .processed
                .as_ref()
                .is_some_and(|p| Arc::ptr_eq(p, &original));
            if already_original {
                return Ok(());
            }
            original
        };

        debug!(
            frames = processed.len(),
            duration = processed.duration_secs(),
            "buffer reprocessed"
        );
        // Playback stops before the buffer is swapped
        self.playback.load(Arc::clone(&processed));
        let artifact = self.artifacts.register(encode_buffer(&processed));
        self.replace_current_artifact(Some(artifact));
        self.processed = Some(processed);
        Ok(())
    }

    /// Make a history item current again, dropping any edits
    pub fn restore_history(&mut self, id: &str) -> Result<()> {
        let Some(item) = self.history.get(id).cloned() else {
            return Err(SuaraError::InvalidParameter {
                param: "history id".to_string(),
                value: id.to_string(),
                expected: "an id from the history list".to_string(),
            });
        };

        self.playback.stop();
        self.artifacts.retain(&item.artifact)?;
        self.replace_current_artifact(Some(item.artifact.clone()));

        self.original = Some(Arc::clone(&item.buffer));
        self.processed = Some(Arc::clone(&item.buffer));
        self.playback.load(Arc::clone(&item.buffer));
        self.current_item = Some(item.id.clone());
        self.current_file_name = Some(item.title.clone());
        self.last_error = None;

        self.session.edit_config = EditConfig::default();
        self.session.active_tab = item.kind;
        self.persist();
        info!(id = %item.id, title = %item.title, "history item restored");
        Ok(())
    }

    /// Drop the current audio
    pub fn clear_upload(&mut self) {
        self.playback.unload();
        self.original = None;
        self.processed = None;
        self.replace_current_artifact(None);
        self.current_item = None;
        self.current_file_name = None;
        self.last_error = None;
        debug!("current audio cleared");
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    /// `suara-ai-{tab}-{unix millis}.wav`
    pub fn download_file_name(&self) -> String {
        format!(
            "suara-ai-{}-{}.wav",
            self.session.active_tab,
            Utc::now().timestamp_millis()
        )
    }

    /// WAV bytes of the processed buffer
    pub fn current_wav(&self) -> Result<Arc<Vec<u8>>> {
        let handle = self.current_artifact.as_ref().ok_or(SuaraError::NoAudioLoaded)?;
        self.artifacts.get(handle)
    }

    /// Write the processed buffer as WAV
    pub fn export(&self, path: &Path) -> Result<()> {
        let wav = self.current_wav()?;
        fs::write(path, wav.as_slice())?;
        info!(path = %path.display(), size = wav.len(), "exported");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    pub fn play(&mut self) -> bool {
        self.playback.play()
    }

    pub fn pause(&mut self) {
        self.playback.pause();
    }

    pub fn stop(&mut self) {
        self.playback.stop();
    }

    pub fn playback(&self) -> &PlaybackEngine<S> {
        &self.playback
    }

    pub fn playback_mut(&mut self) -> &mut PlaybackEngine<S> {
        &mut self.playback
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn original(&self) -> Option<&Arc<AudioBuffer>> {
        self.original.as_ref()
    }

    pub fn processed(&self) -> Option<&Arc<AudioBuffer>> {
        self.processed.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    pub fn current_artifact(&self) -> Option<&ArtifactHandle> {
        self.current_artifact.as_ref()
    }

    pub fn current_item_id(&self) -> Option<&str> {
        self.current_item.as_deref()
    }

    pub fn current_file_name(&self) -> Option<&str> {
        self.current_file_name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlaybackState;
    use crate::service::mock::{MockBehavior, MockService};
    use crate::state::store::MemoryStore;
    use approx::assert_abs_diff_eq;

    fn studio() -> Studio {
        Studio::open(Box::new(MemoryStore::new()))
    }

    #[test]
    fn test_titles() {
        assert_eq!(script_title(3), "Percakapan (3 baris)");
        assert_eq!(melody_title(MusicGenre::Lofi, MusicMood::Santai), "Melodi Lofi Santai");
        assert_eq!(upload_title("short.wav"), "short.wav");
        assert_eq!(
            upload_title("a_very_long_recording_name_2024.wav"),
            "a_very_long_recording_nam..."
        );
        assert_eq!(transform_title("make it sound like jazz"), "Mod: make it sound l...");
        assert_eq!(transform_title("robot"), "Mod: robot...");
    }

    #[test]
    fn test_generate_script() {
        let mut studio = studio();
        let service = MockService::new();
        studio.generate(&service).unwrap();

        assert!(!studio.is_generating());
        assert_eq!(studio.history().len(), 1);
        assert_eq!(studio.history().items()[0].title, "Percakapan (3 baris)");
        let original = studio.original().unwrap();
        assert!(Arc::ptr_eq(original, studio.processed().unwrap()));
        assert_eq!(original.len(), 36000);
        assert!(studio.current_wav().is_ok());
    }

    #[test]
    fn test_validation_fails_before_service() {
        let mut studio = studio();
        studio.set_melody_config(MelodyConfig {
            text: " ".to_string(),
            ..MelodyConfig::default()
        });
        studio.set_active_tab(ActiveTab::Melody);

        let service = MockService::new();
        assert!(matches!(studio.generate(&service), Err(SuaraError::EmptyLyrics)));
        assert_eq!(service.calls(), 0);
        assert!(!studio.is_generating());
        assert!(studio.last_error().is_some());
    }

    #[test]
    fn test_service_failure_keeps_previous_audio() {
        let mut studio = studio();
        studio.generate(&MockService::new()).unwrap();
        let before = Arc::clone(studio.original().unwrap());

        let offline = MockService::with_behavior(MockBehavior::Unavailable);
        let err = studio.generate(&offline).unwrap_err();
        assert!(err.is_retryable());
        assert!(!studio.is_generating());
        assert!(Arc::ptr_eq(studio.original().unwrap(), &before));
        assert_eq!(studio.history().len(), 1);
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut studio = studio();
        let service = MockService::new();
        let request = SpeechRequest::from_blocks(&studio.session().script_blocks).unwrap();

        let first = studio.begin_operation();
        let second = studio.begin_operation();

        let stale = studio
            .complete_generation(first, ActiveTab::Script, "old", service.generate_speech(&request))
            .unwrap();
        assert!(!stale);
        assert!(studio.is_generating());
        assert!(studio.history().is_empty());

        let fresh = studio
            .complete_generation(second, ActiveTab::Script, "new", service.generate_speech(&request))
            .unwrap();
        assert!(fresh);
        assert_eq!(studio.history().items()[0].title, "new");
    }

    #[test]
    fn test_edits_reprocess_and_revert() {
        let mut studio = studio();
        studio.generate(&MockService::new()).unwrap();
        let first_artifact = studio.current_artifact().cloned().unwrap();

        assert!(studio.set_edit(EditField::TrimStart, 0.5).unwrap());
        let processed = Arc::clone(studio.processed().unwrap());
        assert_eq!(processed.len(), 24000);
        assert_abs_diff_eq!(processed.duration_secs(), 1.0, epsilon = 1e-9);
        assert_ne!(studio.current_artifact().unwrap(), &first_artifact);

        assert!(studio.set_edit(EditField::TrimStart, 0.0).unwrap());
        assert!(Arc::ptr_eq(studio.processed().unwrap(), studio.original().unwrap()));
        // History copy plus the current download
        assert_eq!(studio.artifacts().live_count(), 2);
    }

    #[test]
    fn test_trim_past_duration_is_rejected() {
        let mut studio = studio();
        studio.generate(&MockService::new()).unwrap();
        assert!(studio.set_edit(EditField::TrimEnd, 1.0).unwrap());
        assert!(!studio.set_edit(EditField::TrimStart, 0.5).unwrap());
        assert_eq!(studio.session().edit_config.trim_start, 0.0);
    }

    #[test]
    fn test_edit_stops_playback() {
        let mut studio = studio();
        studio.generate(&MockService::new()).unwrap();
        assert!(studio.play());
        studio.playback_mut().advance(1000);

        studio.set_edit(EditField::FadeIn, 0.2).unwrap();
        assert_eq!(studio.playback().state(), PlaybackState::Stopped);
        assert_eq!(studio.playback().elapsed_secs(), 0.0);
    }

    #[test]
    fn test_corrupt_upload_keeps_state() {
        let mut studio = studio();
        studio.generate(&MockService::new()).unwrap();
        studio.set_edit(EditField::FadeOut, 0.3).unwrap();
        assert!(studio.play());
        studio.playback_mut().advance(2400);
        let processed = Arc::clone(studio.processed().unwrap());

        let err = studio.upload(b"definitely not audio", "junk.mp3").unwrap_err();
        assert!(matches!(err, SuaraError::UnsupportedAudio { .. }));
        assert!(Arc::ptr_eq(studio.processed().unwrap(), &processed));
        assert_eq!(studio.playback().state(), PlaybackState::Playing);
        assert_abs_diff_eq!(studio.playback().elapsed_secs(), 0.1, epsilon = 1e-9);
        assert_eq!(studio.session().edit_config.fade_out, 0.3);
        assert_eq!(studio.current_file_name(), None);
        assert!(!studio.is_generating());
    }

    #[test]
    fn test_upload_and_transform() {
        let mut studio = studio();
        let source = AudioBuffer::from_channels(vec![vec![0.4; 24000]], 24000).unwrap();
        studio
            .upload(&encode_buffer(&source), "my-very-long-field-recording-take-3.wav")
            .unwrap();
        assert_eq!(studio.history().items()[0].title, "my-very-long-field-record...");

        studio.set_edit(EditField::TrimEnd, 0.5).unwrap();
        studio.transform(&MockService::new(), "whisper").unwrap();

        let item = &studio.history().items()[0];
        assert_eq!(item.title, "Mod: whisper...");
        assert_eq!(item.kind, ActiveTab::Upload);
        assert_eq!(studio.original().unwrap().len(), 12000);
        assert!(!studio.session().edit_config.has_edits());
    }

    #[test]
    fn test_transform_needs_audio() {
        let mut studio = studio();
        assert!(matches!(
            studio.transform(&MockService::new(), "anything"),
            Err(SuaraError::NoAudioLoaded)
        ));
    }

    #[test]
    fn test_restore_history() {
        let mut studio = studio();
        let service = MockService::new();
        studio.generate(&service).unwrap();
        let script_id = studio.history().items()[0].id.clone();

        studio.set_active_tab(ActiveTab::Melody);
        studio.generate(&service).unwrap();
        studio.set_edit(EditField::FadeIn, 1.0).unwrap();

        studio.restore_history(&script_id).unwrap();
        assert_eq!(studio.active_tab(), ActiveTab::Script);
        assert!(!studio.session().edit_config.has_edits());
        assert_eq!(studio.original().unwrap().len(), 36000);
        assert_eq!(studio.current_item_id(), Some(script_id.as_str()));
        assert_eq!(studio.current_file_name(), Some("Percakapan (3 baris)"));
    }

    #[test]
    fn test_clear_upload_releases_download() {
        let mut studio = studio();
        studio.generate(&MockService::new()).unwrap();
        studio.clear_upload();

        assert!(studio.original().is_none());
        assert!(studio.processed().is_none());
        assert!(matches!(studio.current_wav(), Err(SuaraError::NoAudioLoaded)));
        assert_eq!(studio.artifacts().live_count(), 1);
        assert!(!studio.play());
    }

    #[test]
    fn test_download_file_name() {
        let mut studio = studio();
        studio.set_active_tab(ActiveTab::Melody);
        let name = studio.download_file_name();
        assert!(name.starts_with("suara-ai-melody-"));
        assert!(name.ends_with(".wav"));
    }

    #[test]
    fn test_changes_are_persisted() {
        let mut studio = studio();
        studio.set_active_tab(ActiveTab::Upload);
        let saved = load_session(studio.store());
        assert_eq!(saved.active_tab, ActiveTab::Upload);
    }
}
