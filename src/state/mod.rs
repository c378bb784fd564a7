//! Session State Module
//!
//! Persisted session snapshot, key-value store, result history with
//! scoped WAV artifacts, and the studio orchestrator tying them together.

pub mod history;
pub mod session;
pub mod store;
pub mod studio;

pub use history::{ArtifactHandle, ArtifactRegistry, History, HistoryItem, DEFAULT_MAX_HISTORY};
pub use session::{
    default_script_blocks, ActiveTab, BlockUpdate, MelodyConfig, ScriptBlock, SessionSnapshot,
};
pub use store::{load_session, save_session, FileStore, KeyValueStore, MemoryStore, SESSION_KEY};
pub use studio::{
    melody_title, script_title, transform_title, upload_title, OperationToken, Studio,
};
