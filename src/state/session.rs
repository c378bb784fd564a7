//! Persisted session snapshot
//!
//! The part of the studio that survives a restart: active tab, script,
//! melody settings and the edit controls.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::EditConfig;
use crate::error::{Result, SuaraError};
use crate::service::model::{MusicGenre, MusicMood, VoiceName};

/// Which studio mode is in front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveTab {
    #[default]
    Script,
    Melody,
    Upload,
}

impl ActiveTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Melody => "melody",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for ActiveTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActiveTab {
    type Err = SuaraError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "script" => Ok(Self::Script),
            "melody" => Ok(Self::Melody),
            "upload" => Ok(Self::Upload),
            _ => Err(SuaraError::InvalidParameter {
                param: "tab".to_string(),
                value: s.to_string(),
                expected: "script, melody or upload".to_string(),
            }),
        }
    }
}

/// One line of the conversation script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptBlock {
    pub id: String,
    pub speaker: String,
    pub voice: VoiceName,
    pub text: String,
}

impl ScriptBlock {
    /// Create a block with a fresh id.
    pub fn new(speaker: impl Into<String>, voice: VoiceName, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            speaker: speaker.into(),
            voice,
            text: text.into(),
        }
    }
}

/// Editable part of a script block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockUpdate {
    Speaker(String),
    Voice(VoiceName),
    Text(String),
}

/// The script shown on first launch.
pub fn default_script_blocks() -> Vec<ScriptBlock> {
    let block = |id: &str, speaker: &str, voice, text: &str| ScriptBlock {
        id: id.to_string(),
        speaker: speaker.to_string(),
        voice,
        text: text.to_string(),
    };
    vec![
        block(
            "1",
            "Narator",
            VoiceName::Kore,
            "Selamat datang di SuaraAI Studio. Ini adalah demonstrasi pengeditan suara berbasis teks.",
        ),
        block(
            "2",
            "Budi",
            VoiceName::Puck,
            "Wow, suaranya terdengar sangat natural ya! Bagaimana cara kerjanya?",
        ),
        block(
            "3",
            "Narator",
            VoiceName::Kore,
            "Sangat mudah. Cukup ketik naskahmu, pilih karakter, dan AI akan mengubahnya menjadi audio.",
        ),
    ]
}

/// Melody tab settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelodyConfig {
    pub genre: MusicGenre,
    pub mood: MusicMood,
    pub text: String,
}

impl Default for MelodyConfig {
    fn default() -> Self {
        Self {
            genre: MusicGenre::Pop,
            mood: MusicMood::Ceria,
            text: "La la la la la...".to_string(),
        }
    }
}

/// Everything written to the key-value store.
///
/// Fields missing from a stored snapshot take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSnapshot {
    pub active_tab: ActiveTab,
    #[serde(rename = "blocks")]
    pub script_blocks: Vec<ScriptBlock>,
    pub melody_config: MelodyConfig,
    pub edit_config: EditConfig,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            active_tab: ActiveTab::default(),
            script_blocks: default_script_blocks(),
            melody_config: MelodyConfig::default(),
            edit_config: EditConfig::default(),
        }
    }
}

impl SessionSnapshot {
    /// Append an empty block named after its position.
    pub fn add_block(&mut self) -> &ScriptBlock {
        let speaker = format!("Speaker {}", self.script_blocks.len() + 1);
        self.script_blocks
            .push(ScriptBlock::new(speaker, VoiceName::Kore, ""));
        &self.script_blocks[self.script_blocks.len() - 1]
    }

    /// Remove a block by id. Returns false if no block matched.
    pub fn remove_block(&mut self, id: &str) -> bool {
        let before = self.script_blocks.len();
        self.script_blocks.retain(|b| b.id != id);
        self.script_blocks.len() != before
    }

    /// Change one field of a block. Returns false if no block matched.
    pub fn update_block(&mut self, id: &str, update: BlockUpdate) -> bool {
        let Some(block) = self.script_blocks.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        match update {
            BlockUpdate::Speaker(speaker) => block.speaker = speaker,
            BlockUpdate::Voice(voice) => block.voice = voice,
            BlockUpdate::Text(text) => block.text = text,
        }
        true
    }
}
