//! Non-destructive trim and fade editing
//!
//! Edits are always re-derived from the untouched original buffer, so
//! changing a slider never compounds earlier edits.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::buffer::AudioBuffer;

/// Shortest buffer the editor will ever produce, in seconds
pub const MIN_EDIT_DURATION_SECS: f64 = 0.1;

/// Ceiling the edit controls apply to fade lengths, in seconds
pub const FADE_CEILING_SECS: f64 = 5.0;

const FRAME_EPSILON: f64 = 1e-6;

/// Trim and fade settings, all in seconds
///
/// Fields missing from stored JSON read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditConfig {
    pub trim_start: f64,
    pub trim_end: f64,
    pub fade_in: f64,
    pub fade_out: f64,
}

/// One adjustable value of an [`EditConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    TrimStart,
    TrimEnd,
    FadeIn,
    FadeOut,
}

impl fmt::Display for EditField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditField::TrimStart => write!(f, "trim start"),
            EditField::TrimEnd => write!(f, "trim end"),
            EditField::FadeIn => write!(f, "fade in"),
            EditField::FadeOut => write!(f, "fade out"),
        }
    }
}

impl EditConfig {
    pub fn new(trim_start: f64, trim_end: f64, fade_in: f64, fade_out: f64) -> Self {
        Self {
            trim_start,
            trim_end,
            fade_in,
            fade_out,
        }
    }

    /// True if any value would change the buffer
    pub fn has_edits(&self) -> bool {
        self.trim_start > 0.0 || self.trim_end > 0.0 || self.fade_in > 0.0 || self.fade_out > 0.0
    }

    pub fn get(&self, field: EditField) -> f64 {
        match field {
            EditField::TrimStart => self.trim_start,
            EditField::TrimEnd => self.trim_end,
            EditField::FadeIn => self.fade_in,
            EditField::FadeOut => self.fade_out,
        }
    }

    /// Apply a control change the way the edit sliders do
    ///
    /// Negative values clamp to zero and fades are capped at
    /// [`FADE_CEILING_SECS`]. A trim that would leave nothing of a buffer of
    /// `original_duration` seconds is rejected and the config is left as is.
    /// Returns whether the value was accepted.
    pub fn set(&mut self, field: EditField, value: f64, original_duration: f64) -> bool {
        let value = if value.is_nan() { 0.0 } else { value.max(0.0) };

        match field {
            EditField::TrimStart => {
                if value + self.trim_end >= original_duration {
                    return false;
                }
                self.trim_start = value;
            }
            EditField::TrimEnd => {
                if value + self.trim_start >= original_duration {
                    return false;
                }
                self.trim_end = value;
            }
            EditField::FadeIn => self.fade_in = value.min(FADE_CEILING_SECS),
            EditField::FadeOut => self.fade_out = value.min(FADE_CEILING_SECS),
        }
        true
    }
}

/// Trim and fade `original` into a new buffer
///
/// The result is `max(0.1, duration - trim_start - trim_end)` seconds long.
/// Reads past the end of the source produce silence. Fade-in scales sample
/// `i` by `i / fade_in_samples`, so the first sample is silent and unity
/// gain is reached at index `fade_in_samples`; fade-out mirrors this from the
/// tail. Both ramps are independent passes over the trimmed data, so when
/// they overlap their gains multiply.
///
/// # Example
/// ```
/// use suara::engine::{apply_edits, AudioBuffer, EditConfig};
///
/// let original = AudioBuffer::new(1, 48000, 24000);
/// let edited = apply_edits(&original, &EditConfig::new(0.5, 0.5, 0.0, 0.0));
/// assert_eq!(edited.len(), 24000);
/// ```
pub fn apply_edits(original: &AudioBuffer, config: &EditConfig) -> AudioBuffer {
    let sample_rate = original.sample_rate as f64;
    let trim_start = non_negative(config.trim_start);
    let trim_end = non_negative(config.trim_end);

    let new_duration =
        (original.duration_secs() - trim_start - trim_end).max(MIN_EDIT_DURATION_SECS);
    let new_length = seconds_to_frames(new_duration, sample_rate);
    let start_offset = seconds_to_frames(trim_start, sample_rate);

    let fade_in_samples = seconds_to_frames(non_negative(config.fade_in), sample_rate);
    let fade_out_samples = seconds_to_frames(non_negative(config.fade_out), sample_rate);

    let samples = original
        .samples
        .iter()
        .map(|source| {
            let mut data: Vec<f32> = (0..new_length)
                .map(|i| {
                    start_offset
                        .checked_add(i)
                        .and_then(|idx| source.get(idx))
                        .copied()
                        .unwrap_or(0.0)
                })
                .collect();

            apply_fade_in(&mut data, fade_in_samples);
            apply_fade_out(&mut data, fade_out_samples);
            data
        })
        .collect();

    AudioBuffer {
        samples,
        sample_rate: original.sample_rate,
    }
}

/// `floor(secs * rate)`, saturating on overflow
///
/// The epsilon keeps `len / rate * rate` from flooring to `len - 1`.
fn seconds_to_frames(secs: f64, sample_rate: f64) -> usize {
    (secs * sample_rate + FRAME_EPSILON).floor() as usize
}

fn non_negative(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0)
    }
}

fn apply_fade_in(data: &mut [f32], fade_samples: usize) {
    if fade_samples == 0 {
        return;
    }
    for (i, sample) in data.iter_mut().take(fade_samples).enumerate() {
        *sample = (*sample as f64 * (i as f64 / fade_samples as f64)) as f32;
    }
}

fn apply_fade_out(data: &mut [f32], fade_samples: usize) {
    if fade_samples == 0 {
        return;
    }
    for (i, sample) in data.iter_mut().rev().take(fade_samples).enumerate() {
        *sample = (*sample as f64 * (i as f64 / fade_samples as f64)) as f32;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn ramp_buffer(len: usize, sample_rate: u32) -> AudioBuffer {
        let data = (0..len).map(|i| ((i % 200) as f32 / 200.0) + 0.1).collect();
        AudioBuffer::from_channels(vec![data], sample_rate).unwrap()
    }

    fn constant_buffer(len: usize, value: f32) -> AudioBuffer {
        AudioBuffer::from_channels(vec![vec![value; len]], 1000).unwrap()
    }

    #[test]
    fn test_identity_edit() {
        let original = ramp_buffer(2400, 24000);
        let edited = apply_edits(&original, &EditConfig::default());
        assert_eq!(edited, original);
    }

    #[test]
    fn test_trim_copies_window() {
        let original = ramp_buffer(24000, 24000);
        let edited = apply_edits(&original, &EditConfig::new(0.25, 0.25, 0.0, 0.0));

        assert_eq!(edited.len(), 12000);
        assert_eq!(edited.channel(0), &original.channel(0)[6000..18000]);
    }

    #[test_case(0.5, 0.5 ; "trim covers everything")]
    #[test_case(0.9, 0.0 ; "trim start past end")]
    #[test_case(10.0, 10.0 ; "trim far exceeds duration")]
    fn test_duration_floor(trim_start: f64, trim_end: f64) {
        let original = ramp_buffer(500, 1000);
        let edited = apply_edits(&original, &EditConfig::new(trim_start, trim_end, 0.0, 0.0));

        assert_eq!(edited.len(), 100);
        assert!(edited.duration_secs() >= MIN_EDIT_DURATION_SECS);
    }

    #[test]
    fn test_out_of_range_reads_are_silent() {
        let original = constant_buffer(500, 0.5);
        let edited = apply_edits(&original, &EditConfig::new(0.45, 0.45, 0.0, 0.0));

        // 0.1s floor from offset 450 reads 50 real samples then 50 silent ones
        assert_eq!(edited.len(), 100);
        assert!(edited.channel(0)[..50].iter().all(|&s| s == 0.5));
        assert!(edited.channel(0)[50..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_fade_in_law() {
        let original = constant_buffer(1000, 1.0);
        let edited = apply_edits(&original, &EditConfig::new(0.0, 0.0, 0.1, 0.0));
        let data = edited.channel(0);

        assert_eq!(data[0], 0.0);
        assert_relative_eq!(data[50], 0.5);
        assert!(data[99] < 1.0);
        assert_eq!(data[100], 1.0);
    }

    #[test]
    fn test_fade_out_mirrors_fade_in() {
        let original = constant_buffer(1000, 1.0);
        let fade_in = apply_edits(&original, &EditConfig::new(0.0, 0.0, 0.1, 0.0));
        let fade_out = apply_edits(&original, &EditConfig::new(0.0, 0.0, 0.0, 0.1));

        let forward = fade_in.channel(0);
        let reversed: Vec<f32> = fade_out.channel(0).iter().rev().copied().collect();
        assert_eq!(forward, reversed.as_slice());
        assert_eq!(fade_out.channel(0)[999], 0.0);
        assert_eq!(fade_out.channel(0)[899], 1.0);
    }

    #[test]
    fn test_overlapping_fades_compound() {
        let original = constant_buffer(100, 1.0);
        // both windows are 100 samples over a 100 sample buffer
        let edited = apply_edits(&original, &EditConfig::new(0.0, 0.0, 0.1, 0.1));
        let data = edited.channel(0);

        assert_relative_eq!(data[50], (0.5 * (49.0 / 100.0)) as f32);
        assert_eq!(data[0], 0.0);
        assert_eq!(data[99], 0.0);
    }

    #[test]
    fn test_fades_longer_than_buffer_do_not_overflow() {
        let original = constant_buffer(100, 1.0);
        let edited = apply_edits(&original, &EditConfig::new(0.0, 0.0, 1e12, f64::INFINITY));
        assert_eq!(edited.len(), 100);
        assert!(edited.channel(0).iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_huge_trim_start_does_not_overflow() {
        let original = constant_buffer(500, 1.0);
        let edited = apply_edits(&original, &EditConfig::new(1e300, 0.0, 0.0, 0.0));
        assert_eq!(edited.len(), 100);
        assert!(edited.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_original_untouched_and_deterministic() {
        let original = ramp_buffer(4800, 24000);
        let snapshot = original.clone();
        let config = EditConfig::new(0.01, 0.02, 0.03, 0.04);

        let a = apply_edits(&original, &config);
        let b = apply_edits(&original, &config);
        assert_eq!(original, snapshot);
        assert_eq!(a, b);
    }

    #[test]
    fn test_channels_processed_independently() {
        let original =
            AudioBuffer::from_channels(vec![vec![1.0; 1000], vec![-1.0; 1000]], 1000).unwrap();
        let edited = apply_edits(&original, &EditConfig::new(0.1, 0.0, 0.1, 0.0));

        assert_eq!(edited.channels(), 2);
        assert_relative_eq!(edited.channel(0)[50], 0.5);
        assert_relative_eq!(edited.channel(1)[50], -0.5);
    }

    #[test]
    fn test_has_edits() {
        assert!(!EditConfig::default().has_edits());
        assert!(EditConfig::new(0.0, 0.0, 0.0, 0.1).has_edits());
    }

    #[test]
    fn test_set_clamps_negative() {
        let mut config = EditConfig::default();
        assert!(config.set(EditField::TrimStart, -3.0, 10.0));
        assert_eq!(config.trim_start, 0.0);
    }

    #[test]
    fn test_set_rejects_trim_covering_duration() {
        let mut config = EditConfig::new(4.0, 0.0, 0.0, 0.0);
        assert!(!config.set(EditField::TrimEnd, 6.0, 10.0));
        assert_eq!(config.trim_end, 0.0);
        assert!(config.set(EditField::TrimEnd, 5.9, 10.0));
        assert_eq!(config.trim_end, 5.9);
    }

    #[test_case(EditField::FadeIn ; "fade in")]
    #[test_case(EditField::FadeOut ; "fade out")]
    fn test_set_caps_fades(field: EditField) {
        let mut config = EditConfig::default();
        assert!(config.set(field, 12.0, 1.0));
        assert_eq!(config.get(field), FADE_CEILING_SECS);
    }

    #[test]
    fn test_serde_uses_camel_case() {
        let json = serde_json::to_string(&EditConfig::new(1.0, 0.0, 0.5, 0.0)).unwrap();
        assert!(json.contains("\"trimStart\":1.0"));
        assert!(json.contains("\"fadeIn\":0.5"));
    }
}
