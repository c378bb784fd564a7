//! CLI Command Implementations
//!
//! Each command opens the studio on the session directory, runs one flow and
//! writes any produced audio to disk.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::{info, warn};
use serde::Deserialize;

use crate::engine::{apply_edits, encode_buffer, format_time, import_audio, AudioBuffer, EditField};
use crate::service::{
    GeminiService, GenerationService, MockService, MusicGenre, MusicMood, VoiceName,
};
use crate::state::{ActiveTab, FileStore, ScriptBlock, Studio};

/// One line of a script file.
#[derive(Debug, Deserialize)]
struct ScriptFileLine {
    speaker: String,
    voice: VoiceName,
    text: String,
}

/// Turn a library error into one carrying its user-facing message.
fn friendly<T>(result: crate::Result<T>) -> anyhow::Result<T> {
    result.map_err(|e| {
        let message = e.friendly_message();
        anyhow::Error::new(e).context(message)
    })
}

fn open_studio(state_dir: &Path) -> anyhow::Result<Studio> {
    let store = FileStore::open(state_dir)
        .with_context(|| format!("cannot open session directory {}", state_dir.display()))?;
    Ok(Studio::open(Box::new(store)))
}

fn service(mock: bool) -> Box<dyn GenerationService> {
    if mock {
        Box::new(MockService::new())
    } else {
        Box::new(GeminiService::from_env())
    }
}

fn describe(buffer: &AudioBuffer) -> String {
    format!(
        "{} ch, {} Hz, {} ({} frames), peak {:.1} dB",
        buffer.channels(),
        buffer.sample_rate,
        format_time(buffer.duration_secs()),
        buffer.len(),
        buffer.peak_db()
    )
}

/// Export the current audio to `output` or a timestamped file name.
fn write_current(studio: &Studio, output: Option<&Path>) -> anyhow::Result<PathBuf> {
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(studio.download_file_name()));
    friendly(studio.export(&path))?;
    Ok(path)
}

fn report(studio: &Studio, path: &Path) {
    if let Some(item) = studio.history().items().first() {
        println!("{}", item.title);
    }
    if let Some(buffer) = studio.processed() {
        println!("  {}", describe(buffer));
    }
    println!("Saved: {}", path.display());
}

/// Generate the session script (optionally replaced from a file).
pub fn speak(
    state_dir: &Path,
    mock: bool,
    script: Option<&Path>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut studio = open_studio(state_dir)?;

    if let Some(path) = script {
        info!("Loading script from: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read script {}", path.display()))?;
        let lines: Vec<ScriptFileLine> = serde_json::from_str(&content)
            .with_context(|| format!("invalid script file {}", path.display()))?;
        studio.set_script_blocks(
            lines
                .into_iter()
                .map(|l| ScriptBlock::new(l.speaker, l.voice, l.text))
                .collect(),
        );
    }
    studio.set_active_tab(ActiveTab::Script);

    let service = service(mock);
    info!("Generating speech with {}", service.name());
    friendly(studio.generate(service.as_ref()))?;

    let path = write_current(&studio, output)?;
    report(&studio, &path);
    Ok(())
}

/// Generate a melody, updating any given melody settings first.
pub fn melody(
    state_dir: &Path,
    mock: bool,
    genre: Option<&str>,
    mood: Option<&str>,
    text: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut studio = open_studio(state_dir)?;

    let mut config = studio.session().melody_config.clone();
    if let Some(genre) = genre {
        config.genre = friendly(genre.parse::<MusicGenre>())?;
    }
    if let Some(mood) = mood {
        config.mood = friendly(mood.parse::<MusicMood>())?;
    }
    if let Some(text) = text {
        config.text = text.to_string();
    }
    studio.set_melody_config(config);
    studio.set_active_tab(ActiveTab::Melody);

    let service = service(mock);
    info!("Generating melody with {}", service.name());
    friendly(studio.generate(service.as_ref()))?;

    let path = write_current(&studio, output)?;
    report(&studio, &path);
    Ok(())
}

fn upload_into(studio: &mut Studio, file: &Path) -> anyhow::Result<()> {
    info!("Uploading: {}", file.display());
    let bytes = fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    studio.set_active_tab(ActiveTab::Upload);
    friendly(studio.upload(&bytes, &name))
}

/// Decode an audio file and print its properties.
pub fn upload(state_dir: &Path, file: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let mut studio = open_studio(state_dir)?;
    upload_into(&mut studio, file)?;

    match output {
        Some(path) => {
            let path = write_current(&studio, Some(path))?;
            report(&studio, &path);
        }
        None => {
            if let Some(buffer) = studio.original() {
                println!("{}", describe(buffer));
            }
        }
    }
    Ok(())
}

/// Restyle an audio file.
pub fn transform(
    state_dir: &Path,
    mock: bool,
    file: &Path,
    instruction: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut studio = open_studio(state_dir)?;
    upload_into(&mut studio, file)?;

    let service = service(mock);
    info!("Transforming with {}: {}", service.name(), instruction);
    friendly(studio.transform(service.as_ref(), instruction))?;

    let path = write_current(&studio, output)?;
    report(&studio, &path);
    Ok(())
}

/// Store trim and fade values in the session.
pub fn edit(
    state_dir: &Path,
    trim_start: Option<f64>,
    trim_end: Option<f64>,
    fade_in: Option<f64>,
    fade_out: Option<f64>,
) -> anyhow::Result<()> {
    let mut studio = open_studio(state_dir)?;

    let changes = [
        (EditField::TrimStart, trim_start),
        (EditField::TrimEnd, trim_end),
        (EditField::FadeIn, fade_in),
        (EditField::FadeOut, fade_out),
    ];
    for (field, value) in changes {
        let Some(value) = value else { continue };
        if !friendly(studio.set_edit(field, value))? {
            warn!("Rejected {} = {}s", field, value);
        }
    }

    let config = studio.session().edit_config;
    println!("Trim start: {:.2}s", config.trim_start);
    println!("Trim end:   {:.2}s", config.trim_end);
    println!("Fade in:    {:.2}s", config.fade_in);
    println!("Fade out:   {:.2}s", config.fade_out);
    Ok(())
}

/// Apply the session edits to `input` and write the result.
pub fn export(state_dir: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
    let studio = open_studio(state_dir)?;
    let config = studio.session().edit_config;

    info!("Exporting {} -> {}", input.display(), output.display());
    let original = friendly(import_audio(input))?;

    let total = original.duration_secs();
    if config.trim_start + config.trim_end >= total {
        warn!(
            "Trims ({:.2}s + {:.2}s) exceed the {:.2}s input, output is clamped",
            config.trim_start, config.trim_end, total
        );
    }

    let edited = apply_edits(&original, &config);
    fs::write(output, encode_buffer(&edited))
        .with_context(|| format!("cannot write {}", output.display()))?;

    println!("{}", describe(&edited));
    println!("Saved: {}", output.display());
    Ok(())
}

/// Print or reset the saved session.
pub fn session(state_dir: &Path, reset: bool) -> anyhow::Result<()> {
    let mut studio = open_studio(state_dir)?;
    if reset {
        friendly(studio.reset_session())?;
        println!("Session reset.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(studio.session())?);
    Ok(())
}

/// List the fixed voice, genre and mood sets.
pub fn voices() {
    println!("Voices:");
    for voice in VoiceName::ALL {
        println!(
            "  {:<8} {:<7} {}",
            voice.as_str(),
            format!("{:?}", voice.gender()),
            voice.style()
        );
    }
    let genres: Vec<&str> = MusicGenre::ALL.iter().map(|g| g.as_str()).collect();
    let moods: Vec<&str> = MusicMood::ALL.iter().map(|m| m.as_str()).collect();
    println!("Genres: {}", genres.join(", "));
    println!("Moods:  {}", moods.join(", "));
}
