//! CLI Module
//!
//! Command-line interface for the SuaraAI studio.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default directory for the persisted session
pub const DEFAULT_STATE_DIR: &str = ".suara";

/// SuaraAI Studio - speech and melody generation with trim/fade export
#[derive(Parser, Debug)]
#[command(name = "suara-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the saved session
    #[arg(long, global = true, default_value = DEFAULT_STATE_DIR)]
    pub state_dir: PathBuf,

    /// Use the offline mock service instead of the hosted model
    #[arg(long, global = true)]
    pub mock: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a conversation from the session script
    #[command(name = "speak")]
    Speak {
        /// JSON file with `[{speaker, voice, text}]` lines, replacing the saved script
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Output WAV (defaults to a timestamped name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a sung or hummed melody
    #[command(name = "melody")]
    Melody {
        /// Pop, Jazz, Rock, Lofi or Klasik
        #[arg(short, long)]
        genre: Option<String>,

        /// Ceria, Sedih, Epik, Santai or Tegang
        #[arg(short, long)]
        mood: Option<String>,

        /// Lyrics or humming text
        #[arg(short, long)]
        text: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode an audio file and report its properties
    #[command(name = "upload")]
    Upload {
        /// Input audio file
        file: PathBuf,

        /// Write the decoded audio as WAV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Restyle an audio file with a free-text instruction
    #[command(name = "transform")]
    Transform {
        /// Input audio file
        file: PathBuf,

        /// How the audio should change
        #[arg(short, long)]
        instruction: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Set trim and fade values in the session
    #[command(name = "edit")]
    Edit {
        /// Seconds removed from the start
        #[arg(long)]
        trim_start: Option<f64>,

        /// Seconds removed from the end
        #[arg(long)]
        trim_end: Option<f64>,

        /// Fade-in length in seconds (max 5)
        #[arg(long)]
        fade_in: Option<f64>,

        /// Fade-out length in seconds (max 5)
        #[arg(long)]
        fade_out: Option<f64>,
    },

    /// Apply the session edits to a file and write the result as WAV
    #[command(name = "export")]
    Export {
        /// Input audio file
        input: PathBuf,

        /// Output WAV
        output: PathBuf,
    },

    /// Inspect or reset the saved session
    #[command(name = "session")]
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// List voices, genres and moods
    #[command(name = "voices")]
    Voices,
}

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Print the saved session as JSON
    Show,
    /// Restore the default session
    Reset,
}
