//! Studio Flow Tests
//!
//! Session persistence, history bounds and failure handling through the
//! public studio API.

use std::fs;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use suara::engine::{encode_buffer, AudioBuffer, AudioSink, EditField, PlaybackState};
use suara::service::{MockBehavior, MockService};
use suara::state::{
    ActiveTab, ArtifactRegistry, BlockUpdate, FileStore, History, HistoryItem, KeyValueStore,
    MemoryStore, Studio, SESSION_KEY,
};
use suara::SuaraError;

/// Sink recording every start/stop call
#[derive(Clone, Default)]
struct SharedSink {
    events: Arc<Mutex<Vec<String>>>,
}

impl AudioSink for SharedSink {
    fn start(&mut self, _buffer: Arc<AudioBuffer>, offset_secs: f64) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start@{:.1}", offset_secs));
    }

    fn stop(&mut self) {
        self.events.lock().unwrap().push("stop".to_string());
    }
}

fn file_studio(dir: &TempDir) -> Studio {
    Studio::open(Box::new(FileStore::open(dir.path()).unwrap()))
}

// === Persistence ===

#[test]
fn test_session_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let mut studio = file_studio(&dir);
        studio.set_active_tab(ActiveTab::Melody);
        let id = studio.add_block();
        studio.update_block(&id, BlockUpdate::Text("Terima kasih".to_string()));
        studio.set_edit(EditField::FadeOut, 2.0).unwrap();
    }

    let studio = file_studio(&dir);
    let session = studio.session();
    assert_eq!(session.active_tab, ActiveTab::Melody);
    assert_eq!(session.script_blocks.len(), 4);
    assert_eq!(session.script_blocks[3].text, "Terima kasih");
    assert_eq!(session.edit_config.fade_out, 2.0);
}

#[test]
fn test_corrupt_session_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(format!("{}.json", SESSION_KEY)), "]]]").unwrap();

    let studio = file_studio(&dir);
    assert_eq!(studio.active_tab(), ActiveTab::Script);
    assert_eq!(studio.session().script_blocks.len(), 3);
}

#[test]
fn test_stored_json_uses_app_field_names() {
    let mut studio = Studio::open(Box::new(MemoryStore::new()));
    studio.set_active_tab(ActiveTab::Upload);

    let raw = studio.store().get(SESSION_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["activeTab"], "upload");
    assert!(value["blocks"].is_array());
    assert!(value["melodyConfig"].is_object());
    assert!(value["editConfig"]["fadeIn"].is_number());
}

// === History ===

#[test]
fn test_history_is_bounded_and_releases_artifacts() {
    let mut registry = ArtifactRegistry::new();
    let mut history = History::default();
    let buffer = Arc::new(AudioBuffer::new(1, 240, 24000));

    let mut first_handle = None;
    for i in 0..60 {
        let handle = registry.register(encode_buffer(&buffer));
        if i == 0 {
            first_handle = Some(handle.clone());
        }
        let item = HistoryItem::new(
            ActiveTab::Script,
            format!("item {}", i),
            handle,
            Arc::clone(&buffer),
        );
        history.push(item, &mut registry);
    }

    assert_eq!(history.len(), 50);
    assert_eq!(history.items()[0].title, "item 59");
    assert_eq!(registry.live_count(), 50);
    assert!(!registry.contains(&first_handle.unwrap()));
}

#[test]
fn test_repeated_generation_keeps_one_download() {
    let mut studio = Studio::open(Box::new(MemoryStore::new()));
    let service = MockService::new();
    for _ in 0..3 {
        studio.generate(&service).unwrap();
    }
    // Three history artifacts, the newest shared with the download
    assert_eq!(studio.history().len(), 3);
    assert_eq!(studio.artifacts().live_count(), 3);
}

// === Failures ===

#[test]
fn test_corrupt_upload_leaves_playback_untouched() {
    let sink = SharedSink::default();
    let events = Arc::clone(&sink.events);
    let mut studio = Studio::with_sink(Box::new(MemoryStore::new()), sink);

    let source = AudioBuffer::from_channels(vec![vec![0.25; 48000]], 24000).unwrap();
    studio.upload(&encode_buffer(&source), "take.wav").unwrap();
    assert!(studio.play());
    studio.playback_mut().advance(12000);
    let before = events.lock().unwrap().len();

    let err = studio.upload(&[0u8; 128], "broken.wav").unwrap_err();
    assert!(matches!(err, SuaraError::UnsupportedAudio { .. }));
    assert!(studio.last_error().unwrap().contains("corrupted"));

    assert_eq!(events.lock().unwrap().len(), before);
    assert_eq!(studio.playback().state(), PlaybackState::Playing);
    assert_eq!(studio.playback().elapsed_secs(), 0.5);
    assert_eq!(studio.original().unwrap().len(), 48000);
    assert_eq!(studio.current_file_name(), Some("take.wav"));
    assert_eq!(studio.history().len(), 1);
}

#[test]
fn test_empty_response_is_reported_and_recoverable() {
    let mut studio = Studio::open(Box::new(MemoryStore::new()));
    let empty = MockService::with_behavior(MockBehavior::Empty);

    let err = studio.generate(&empty).unwrap_err();
    assert!(matches!(err, SuaraError::EmptyResponse));
    assert!(!studio.is_generating());
    assert!(studio.original().is_none());

    studio.generate(&MockService::new()).unwrap();
    assert!(studio.last_error().is_none());
    assert!(studio.original().is_some());
}

#[test]
fn test_export_writes_processed_audio() {
    let dir = TempDir::new().unwrap();
    let mut studio = Studio::open(Box::new(MemoryStore::new()));
    studio.generate(&MockService::new()).unwrap();
    studio.set_edit(EditField::TrimStart, 1.0).unwrap();

    let path = dir.path().join(studio.download_file_name());
    studio.export(&path).unwrap();

    let bytes = fs::read(&path).unwrap();
    // 0.5 s of mono 16-bit audio at 24 kHz
    assert_eq!(bytes.len(), 44 + 12000 * 2);
}
