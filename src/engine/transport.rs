//! Playback Engine
//!
//! Tracks what is playing and where, independent of the audio device. The
//! device side is an [`AudioSink`]; the device callback drives the playhead
//! through [`PlaybackEngine::advance`], which also feeds the visualization
//! tap.
//!
//! State machine: `Stopped -> Playing -> {Paused -> Playing | Stopped}`.
//! Resuming from pause continues at the recorded offset; reaching the end of
//! the buffer stops playback and rewinds to zero.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::engine::analyser::Analyser;
use crate::engine::buffer::AudioBuffer;

/// Playback states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing scheduled, offset at zero (default state)
    #[default]
    Stopped,
    /// Buffer is being rendered
    Playing,
    /// Rendering halted, offset retained
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "Stopped"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}

/// The audio output the engine schedules buffers on
pub trait AudioSink {
    /// Begin rendering `buffer` from `offset_secs`
    fn start(&mut self, buffer: Arc<AudioBuffer>, offset_secs: f64);

    /// Halt rendering and release the scheduled buffer
    fn stop(&mut self);
}

/// Sink that renders nothing, for headless use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn start(&mut self, _buffer: Arc<AudioBuffer>, _offset_secs: f64) {}

    fn stop(&mut self) {}
}

/// Schedules buffer playback and tracks elapsed position
pub struct PlaybackEngine<S: AudioSink> {
    sink: S,
    state: PlaybackState,
    buffer: Option<Arc<AudioBuffer>>,
    /// Playhead in frames of the loaded buffer
    position: u64,
    gain: f32,
    analyser: Analyser,
}

impl Default for PlaybackEngine<NullSink> {
    fn default() -> Self {
        Self::new(NullSink)
    }
}

impl<S: AudioSink> PlaybackEngine<S> {
    /// Create an engine rendering to `sink`
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: PlaybackState::Stopped,
            buffer: None,
            position: 0,
            gain: 1.0,
            analyser: Analyser::default(),
        }
    }

    /// Replace the playable buffer
    ///
    /// Playback is stopped first so the sink never reads a buffer that is
    /// being swapped out.
    pub fn load(&mut self, buffer: Arc<AudioBuffer>) {
        self.stop();
        debug!(
            frames = buffer.len(),
            sample_rate = buffer.sample_rate,
            "[PLAYBACK] Buffer loaded"
        );
        self.buffer = Some(buffer);
    }

    /// Drop the playable buffer
    pub fn unload(&mut self) {
        self.stop();
        self.buffer = None;
    }

    /// Start or resume playback
    ///
    /// Restarts from zero when the recorded offset is at or past the end.
    /// Returns false when there is nothing to play.
    pub fn play(&mut self) -> bool {
        let Some(buffer) = self.buffer.clone() else {
            return false;
        };

        match self.state {
            PlaybackState::Playing => {
                debug!("[PLAYBACK] Already playing");
            }
            PlaybackState::Stopped | PlaybackState::Paused => {
                if self.position >= buffer.len() as u64 {
                    self.position = 0;
                }
                let offset = self.elapsed_secs();
                self.sink.start(buffer, offset);
                self.state = PlaybackState::Playing;
                debug!("[PLAYBACK] Play from {:.3}s", offset);
            }
        }
        true
    }

    /// Pause playback, keeping the offset
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.sink.stop();
            self.state = PlaybackState::Paused;
            debug!("[PLAYBACK] Paused at {:.3}s", self.elapsed_secs());
        }
    }

    /// Stop playback and rewind to zero
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Playing {
            self.sink.stop();
        }
        self.state = PlaybackState::Stopped;
        self.position = 0;
        self.analyser.reset();
    }

    /// Seek to `secs`, clamped to the buffer
    ///
    /// While playing the sink is rescheduled at the new offset.
    pub fn seek(&mut self, secs: f64) {
        let Some(buffer) = self.buffer.clone() else {
            return;
        };

        let frames = (secs.max(0.0) * buffer.sample_rate as f64) as u64;
        self.position = frames.min(buffer.len() as u64);

        if self.state == PlaybackState::Playing {
            self.sink.stop();
            self.sink.start(buffer, self.elapsed_secs());
        }
        debug!("[PLAYBACK] Seek to {:.3}s", self.elapsed_secs());
    }

    /// Advance the playhead by `frames` (called from the device callback)
    ///
    /// Rendered samples, mixed to mono and scaled by the gain, go to the
    /// analyser. Returns true if this call reached the end of the buffer.
    pub fn advance(&mut self, frames: usize) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        let Some(buffer) = self.buffer.clone() else {
            return false;
        };

        let len = buffer.len() as u64;
        let start = self.position.min(len) as usize;
        let end = self.position.saturating_add(frames as u64).min(len) as usize;

        let channels = buffer.channels().max(1) as f32;
        let gain = self.gain;
        self.analyser.push_samples((start..end).map(|i| {
            let sum: f32 = buffer.samples.iter().map(|ch| ch[i]).sum();
            sum / channels * gain
        }));

        self.position = end as u64;

        if self.position >= len {
            self.sink.stop();
            self.state = PlaybackState::Stopped;
            self.position = 0;
            debug!("[PLAYBACK] Reached end of buffer");
            return true;
        }
        false
    }

    /// Elapsed playback time in seconds, never past the duration
    pub fn elapsed_secs(&self) -> f64 {
        match &self.buffer {
            Some(buffer) if buffer.sample_rate > 0 => {
                (self.position as f64 / buffer.sample_rate as f64).min(buffer.duration_secs())
            }
            _ => 0.0,
        }
    }

    /// Duration of the loaded buffer, zero when none
    pub fn duration_secs(&self) -> f64 {
        self.buffer
            .as_ref()
            .map(|b| b.duration_secs())
            .unwrap_or(0.0)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.state == PlaybackState::Stopped
    }

    pub fn buffer(&self) -> Option<&Arc<AudioBuffer>> {
        self.buffer.as_ref()
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set the output gain (negative values clamp to zero)
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    pub fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    pub fn analyser_mut(&mut self) -> &mut Analyser {
        &mut self.analyser
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Format seconds as `m:ss.d`
pub fn format_time(secs: f64) -> String {
    let secs = secs.max(0.0);
    let minutes = (secs / 60.0).floor() as u64;
    let seconds = (secs % 60.0).floor() as u64;
    let tenths = ((secs % 1.0) * 10.0).floor() as u64;
    format!("{}:{:02}.{}", minutes, seconds, tenths)
}

// ============================================================================
// Unit Tests
// ============================================================================
