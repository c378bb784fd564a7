//! Visualization tap for the playback engine
//!
//! Keeps the most recent `fft_size` samples that went to the output and
//! exposes them as time-domain or frequency-domain data, with the same byte
//! scaling a browser analyser node uses (128 = silence for waveforms,
//! -100..-30 dB mapped onto 0..255 for spectra).

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Default analysis window
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Default smoothing between successive spectra
pub const DEFAULT_SMOOTHING: f32 = 0.8;

const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Rolling sample window with FFT analysis
pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    window: VecDeque<f32>,
    smoothed: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Default for Analyser {
    fn default() -> Self {
        Self::new(DEFAULT_FFT_SIZE)
    }
}

impl Analyser {
    /// Create an analyser over the last `fft_size` samples
    ///
    /// `fft_size` is raised to at least 32.
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(32);
        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        Self {
            fft_size,
            smoothing: DEFAULT_SMOOTHING,
            window: std::iter::repeat(0.0).take(fft_size).collect(),
            smoothed: vec![0.0; fft_size / 2],
            fft,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins (`fft_size / 2`)
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Set the smoothing time constant, clamped to [0, 1)
    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 0.999);
    }

    /// Feed samples that were just rendered
    pub fn push_samples<I: IntoIterator<Item = f32>>(&mut self, samples: I) {
        for sample in samples {
            self.window.push_back(sample);
        }
        while self.window.len() > self.fft_size {
            self.window.pop_front();
        }
    }

    /// Forget all buffered samples and spectral history
    pub fn reset(&mut self) {
        self.window.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|s| *s = 0.0);
    }

    /// Current waveform as floats
    pub fn time_domain(&self) -> Vec<f32> {
        self.window.iter().copied().collect()
    }

    /// Current waveform as bytes, 128 being silence
    pub fn time_domain_bytes(&self) -> Vec<u8> {
        self.window
            .iter()
            .map(|&s| (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8)
            .collect()
    }

    /// Smoothed magnitude spectrum in dB, one value per bin
    pub fn frequency_db(&mut self) -> Vec<f32> {
        let n = self.fft_size;
        let mut spectrum: Vec<Complex<f32>> = self
            .window
            .iter()
            .enumerate()
            .map(|(i, &s)| Complex::new(s * blackman(i, n), 0.0))
            .collect();

        self.fft.process(&mut spectrum);

        let k = self.smoothing;
        for (prev, bin) in self.smoothed.iter_mut().zip(spectrum.iter()) {
            let magnitude = bin.norm() / n as f32;
            *prev = k * *prev + (1.0 - k) * magnitude;
        }

        self.smoothed
            .iter()
            .map(|&m| if m > 0.0 { 20.0 * m.log10() } else { f32::NEG_INFINITY })
            .collect()
    }

    /// Smoothed spectrum scaled onto 0..255
    pub fn frequency_bytes(&mut self) -> Vec<u8> {
        self.frequency_db()
            .into_iter()
            .map(|db| {
                let scaled = 255.0 * (db - MIN_DB) / (MAX_DB - MIN_DB);
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }
}

fn blackman(i: usize, n: usize) -> f32 {
    let x = 2.0 * PI * i as f32 / n as f32;
    0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_centered() {
        let analyser = Analyser::default();
        let bytes = analyser.time_domain_bytes();
        assert_eq!(bytes.len(), DEFAULT_FFT_SIZE);
        assert!(bytes.iter().all(|&b| b == 128));
    }

    #[test]
    fn test_window_keeps_latest_samples() {
        let mut analyser = Analyser::new(32);
        analyser.push_samples((0..40).map(|i| i as f32));
        let data = analyser.time_domain();
        assert_eq!(data.len(), 32);
        assert_eq!(data[0], 8.0);
        assert_eq!(data[31], 39.0);
    }

    #[test]
    fn test_time_domain_bytes_clamp() {
        let mut analyser = Analyser::new(32);
        analyser.push_samples([1.0, -1.0, 0.5]);
        let bytes = analyser.time_domain_bytes();
        assert_eq!(&bytes[29..], &[255, 0, 192]);
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let n = 2048;
        let bin = 100;
        let mut analyser = Analyser::new(n);
        analyser.push_samples(
            (0..n).map(|i| (2.0 * PI * bin as f32 * i as f32 / n as f32).sin()),
        );

        let spectrum = analyser.frequency_db();
        assert_eq!(spectrum.len(), n / 2);

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
    }

    #[test]
    fn test_silent_spectrum_is_zero_bytes() {
        let mut analyser = Analyser::new(64);
        assert!(analyser.frequency_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reset_clears_window() {
        let mut analyser = Analyser::new(32);
        analyser.push_samples([0.9; 32]);
        analyser.reset();
        assert!(analyser.time_domain().iter().all(|&s| s == 0.0));
    }
}
