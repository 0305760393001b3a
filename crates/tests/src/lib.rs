//! Shared fixtures for the cross-crate integration tests
//!
//! - [`ThreadBackend`]: a playback backend that drains the feed on a
//!   background thread, standing in for an audio device callback
//! - [`band_energy`]: spectral energy of a signal within a frequency band

use calibrate_core::domain::audio::{
    PlaybackBackend, PlaybackHandle, PlaybackOutcome, PlaybackRequest, Result,
};
use calibrate_core::domain::routing::{playback_pair, PlaybackControl};
use crossbeam::channel::Receiver;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Backend whose "device" is a thread pulling fixed-size blocks
pub struct ThreadBackend {
    pub block_frames: usize,
    /// Sleep between blocks
    pub pacing: Duration,
}

impl Default for ThreadBackend {
    fn default() -> Self {
        Self {
            block_frames: 64,
            pacing: Duration::from_millis(1),
        }
    }
}

impl PlaybackBackend for ThreadBackend {
    type Handle = ThreadPlayback;

    fn play(&self, request: PlaybackRequest) -> Result<ThreadPlayback> {
        let (mut feed, control) = playback_pair(&request)?;
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&recorded);
        let block_len = self.block_frames * request.channels as usize;
        let pacing = self.pacing;

        let worker = thread::spawn(move || {
            let mut block = vec![0.0f32; block_len];
            while !feed.is_done() {
                feed.fill(&mut block);
                if let Ok(mut sink) = sink.lock() {
                    sink.extend_from_slice(&block);
                }
                thread::sleep(pacing);
            }
        });

        Ok(ThreadPlayback {
            control,
            recorded,
            worker: Some(worker),
        })
    }
}

/// Handle for a [`ThreadBackend`] playback
pub struct ThreadPlayback {
    control: PlaybackControl,
    recorded: Arc<Mutex<Vec<f32>>>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadPlayback {
    /// Wait for the device thread and return every interleaved sample it produced
    pub fn join(mut self) -> Vec<f32> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.recorded
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }
}

impl PlaybackHandle for ThreadPlayback {
    fn is_playing(&self) -> bool {
        self.control.is_playing()
    }

    fn cancel(&self) {
        self.control.cancel();
    }

    fn completion(&self) -> Receiver<PlaybackOutcome> {
        self.control.completion()
    }
}

/// Samples of channel `channel` (0-based) from an interleaved buffer
pub fn channel_samples(interleaved: &[f32], channels: usize, channel: usize) -> Vec<f32> {
    interleaved
        .chunks(channels)
        .map(|frame| frame[channel])
        .collect()
}

/// Sum of squared FFT magnitudes for bins whose frequency lies in `[low_hz, high_hz]`
pub fn band_energy(signal: &[f64], sample_rate_hz: f64, low_hz: f64, high_hz: f64) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
    let fft = FftPlanner::<f64>::new().plan_fft_forward(buffer.len());
    fft.process(&mut buffer);

    let bin_hz = sample_rate_hz / buffer.len() as f64;
    buffer[..buffer.len() / 2 + 1]
        .iter()
        .enumerate()
        .filter(|(bin, _)| {
            let freq = *bin as f64 * bin_hz;
            freq >= low_hz && freq <= high_hz
        })
        .map(|(_, c)| c.norm_sqr())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_band_energy_finds_sine() {
        let fs = 8000.0;
        let signal: Vec<f64> = (0..8000)
            .map(|i| (2.0 * PI * 1000.0 * i as f64 / fs).sin())
            .collect();

        let inside = band_energy(&signal, fs, 990.0, 1010.0);
        let outside =
            band_energy(&signal, fs, 0.0, 900.0) + band_energy(&signal, fs, 1100.0, 4000.0);
        assert!(inside > 1e6 * outside.max(1e-12));
    }

    #[test]
    fn test_channel_samples() {
        let interleaved = [0.0, 1.0, 0.0, 2.0, 0.0, 3.0];
        assert_eq!(channel_samples(&interleaved, 2, 1), vec![1.0, 2.0, 3.0]);
    }
}
