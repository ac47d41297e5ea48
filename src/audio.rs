//! WAV clip loading and FFT analysis for the audio track.
//!
//! The audio track publishes one float per FFT bin while playing, so the clip
//! keeps its mixed-down samples in memory and computes a windowed magnitude
//! spectrum at whatever millisecond the dispatcher asks for.

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;
use wavers::Wav;

pub const FFT_SIZE: usize = 512;
pub const FFT_BINS: usize = FFT_SIZE / 2;

pub struct AudioClip {
    path: String,
    samples: Vec<f32>,
    sample_rate: u32,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClip")
            .field("path", &self.path)
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl AudioClip {
    /// Loads a WAV file and mixes it down to mono.
    pub fn load(path: &str) -> Result<Self, String> {
        let mut wav = Wav::<f32>::from_path(Path::new(path))
            .map_err(|e| format!("Failed to open WAV '{path}': {e}"))?;
        let channels = usize::from(wav.n_channels()).max(1);
        let sample_rate = wav.sample_rate().max(1) as u32;
        let interleaved: wavers::Samples<f32> = wav
            .read()
            .map_err(|e| format!("WAV read error '{path}': {e}"))?;
        let mut samples = Vec::with_capacity(interleaved.len() / channels + 1);
        for frame in interleaved.chunks(channels) {
            samples.push(frame.iter().sum::<f32>() / channels as f32);
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        Ok(Self {
            path: path.to_string(),
            samples,
            sample_rate,
            fft,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn duration_millis(&self) -> u64 {
        (self.samples.len() as u64 * 1_000) / u64::from(self.sample_rate)
    }

    /// Magnitude spectrum of the Hann-windowed frame starting at `millis`.
    /// Frames past the end of the clip are zero padded.
    pub fn fft_bins(&self, millis: u64) -> Vec<f32> {
        let start = (millis * u64::from(self.sample_rate) / 1_000) as usize;
        let mut buffer = [Complex::new(0.0, 0.0); FFT_SIZE];
        for (i, slot) in buffer.iter_mut().enumerate() {
            let sample = self.samples.get(start + i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * hann_window(i, FFT_SIZE), 0.0);
        }
        self.fft.process(&mut buffer);
        buffer[..FFT_BINS]
            .iter()
            .map(|c| c.norm() / FFT_SIZE as f32)
            .collect()
    }
}

fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_clip(freq: f32, rate: u32, seconds: f32) -> AudioClip {
        let count = (rate as f32 * seconds) as usize;
        let samples = (0..count)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect();
        let mut planner = FftPlanner::new();
        AudioClip {
            path: "test.wav".to_string(),
            samples,
            sample_rate: rate,
            fft: planner.plan_fft_forward(FFT_SIZE),
        }
    }

    #[test]
    fn duration_follows_sample_count() {
        let clip = sine_clip(440.0, 48_000, 2.0);
        assert_eq!(clip.duration_millis(), 2_000);
    }

    #[test]
    fn spectrum_peaks_at_tone_bin() {
        let rate = 48_000;
        let freq = 1_500.0;
        let clip = sine_clip(freq, rate, 1.0);
        let bins = clip.fft_bins(100);
        assert_eq!(bins.len(), FFT_BINS);
        let peak = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let expected = (freq * FFT_SIZE as f32 / rate as f32).round() as usize;
        assert!(peak.abs_diff(expected) <= 1, "peak {peak} expected {expected}");
    }

    #[test]
    fn frames_past_the_end_are_silent() {
        let clip = sine_clip(440.0, 48_000, 0.5);
        let bins = clip.fft_bins(10_000);
        assert!(bins.iter().all(|b| *b == 0.0));
    }
}
