//! Audio Buffer
//!
//! The in-memory buffer every stage of the pipeline produces or consumes:
//! non-interleaved 32-bit float samples plus the sample rate.

use crate::error::{Result, SuaraError};

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Fixed-length, per-channel array of normalized samples
///
/// Every channel holds exactly `len()` samples. Buffers are treated as
/// immutable once handed to the studio; editing always derives a new one.
///
/// # Example
/// ```
/// use suara::engine::AudioBuffer;
///
/// let buffer = AudioBuffer::new(1, 24000, 24000);
/// assert_eq!(buffer.channels(), 1);
/// assert_eq!(buffer.len(), 24000);
/// assert_eq!(buffer.duration_secs(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a silent buffer with `num_channels` channels of `length` frames
    pub fn new(num_channels: usize, length: usize, sample_rate: u32) -> Self {
        Self {
            samples: vec![vec![0.0_f32; length]; num_channels],
            sample_rate,
        }
    }

    /// Create a buffer from per-channel sample vectors
    ///
    /// Fails if the channels disagree on length or there are none.
    pub fn from_channels(samples: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(SuaraError::InvalidParameter {
                param: "channels".to_string(),
                value: "0".to_string(),
                expected: "at least one channel".to_string(),
            });
        };

        let length = first.len();
        if let Some(bad) = samples.iter().position(|ch| ch.len() != length) {
            return Err(SuaraError::InvalidPcm {
                reason: format!(
                    "channel {} has {} samples, expected {}",
                    bad,
                    samples[bad].len(),
                    length
                ),
            });
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Create a buffer from interleaved sample data (L, R, L, R, ...)
    ///
    /// Trailing samples that do not complete a frame are dropped.
    pub fn from_interleaved(interleaved: &[f32], num_channels: usize, sample_rate: u32) -> Self {
        let num_channels = num_channels.max(1);
        let frames = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(frames); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Self {
            samples,
            sample_rate,
        }
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut interleaved = Vec::with_capacity(self.channels() * self.len());

        for frame in 0..self.len() {
            for channel in &self.samples {
                interleaved.push(channel[frame]);
            }
        }

        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of sample frames per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no frames
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds (`len / sample_rate`)
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get a reference to a channel's samples
    ///
    /// # Panics
    /// Panics if channel index is out of bounds
    #[inline]
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.samples[channel]
    }

    /// Get a mutable reference to a channel's samples
    ///
    /// # Panics
    /// Panics if channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.samples[channel]
    }

    /// Absolute peak across all channels in dBFS
    pub fn peak_db(&self) -> f32 {
        let peak = self
            .samples
            .iter()
            .flat_map(|channel| channel.iter())
            .map(|&s| s.abs())
            .fold(0.0_f32, f32::max);

        linear_to_db(peak)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_silent() {
        let buffer = AudioBuffer::new(2, 100, 24000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 100);
        assert!(buffer.samples.iter().flatten().all(|&s| s == 0.0));
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::new(1, 36000, 24000);
        assert_eq!(buffer.duration_secs(), 1.5);
    }

    #[test]
    fn test_duration_zero_sample_rate() {
        let buffer = AudioBuffer::new(1, 10, 0);
        assert_eq!(buffer.duration_secs(), 0.0);
    }

    #[test]
    fn test_interleave_round_trip() {
        let interleaved = vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0];
        let buffer = AudioBuffer::from_interleaved(&interleaved, 2, 24000);

        assert_eq!(buffer.channel(0), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel(1), &[5.0, 6.0, 7.0]);
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_from_interleaved_drops_partial_frame() {
        let buffer = AudioBuffer::from_interleaved(&[0.1, 0.2, 0.3], 2, 24000);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_from_channels_rejects_ragged() {
        let result = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 24000);
        assert!(matches!(result, Err(SuaraError::InvalidPcm { .. })));
    }

    #[test]
    fn test_from_channels_rejects_empty() {
        let result = AudioBuffer::from_channels(Vec::new(), 24000);
        assert!(matches!(result, Err(SuaraError::InvalidParameter { .. })));
    }

    #[test]
    fn test_peak_db() {
        let mut buffer = AudioBuffer::new(1, 4, 24000);
        buffer.channel_mut(0)[2] = -0.5;
        assert!((buffer.peak_db() - (-6.0206)).abs() < 0.01);
        assert_eq!(AudioBuffer::new(1, 4, 24000).peak_db(), f32::NEG_INFINITY);
    }
}
