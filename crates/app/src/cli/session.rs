//! State shared by both front ends: the parameter store, the playback
//! backend and the noise generator

use calibrate_core::domain::audio::{AudioError, PlaybackBackend, PlaybackHandle, PlaybackOutcome};
use calibrate_core::domain::params::ParameterStore;
use calibrate_core::domain::stimulus::{DeviceSettings, Stimulus, StimulusKind, SynthesisError};
use crossbeam::channel::Receiver;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{info, warn};

/// Why a play action did not start
#[derive(Debug, Error)]
pub enum PlayError {
    #[error("{0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Playback failed: {0}")]
    Audio(#[from] AudioError),
}

/// A stimulus that is currently playing
pub struct ActivePlayback<H> {
    pub stimulus: Stimulus,
    pub handle: H,
    pub completion: Receiver<PlaybackOutcome>,
}

impl<H: PlaybackHandle> ActivePlayback<H> {
    pub fn playing_status(&self) -> String {
        self.stimulus.playing_status()
    }

    /// Status line for how the playback ended
    pub fn outcome_status(&self, outcome: &PlaybackOutcome) -> String {
        match outcome {
            PlaybackOutcome::Finished => self.stimulus.finished_status(),
            PlaybackOutcome::Cancelled => "Playback cancelled".to_string(),
            PlaybackOutcome::Failed(reason) => format!("Playback failed: {}", reason),
        }
    }

    /// The outcome, if playback has ended
    pub fn poll(&self) -> Option<PlaybackOutcome> {
        self.completion.try_recv().ok()
    }
}

pub struct Session<B> {
    pub params: ParameterStore,
    backend: B,
    rng: StdRng,
}

impl<B: PlaybackBackend> Session<B> {
    /// `seed` fixes the noise generator; `None` seeds it from the OS
    pub fn new(backend: B, params: ParameterStore, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => {
                info!(seed, "Using fixed noise seed");
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_os_rng(),
        };
        Self {
            params,
            backend,
            rng,
        }
    }

    /// Synthesize the current stimulus of `kind` and start playing it
    pub fn start_playback(
        &mut self,
        kind: StimulusKind,
    ) -> Result<ActivePlayback<B::Handle>, PlayError> {
        let stimulus = Stimulus::from_params(kind, &self.params);
        let device = DeviceSettings::from_params(&self.params);

        let waveform = stimulus
            .render(device.sample_rate_hz, &mut self.rng)
            .map_err(|e| {
                warn!(%kind, error = %e, "Synthesis failed");
                e
            })?;
        let request = device.playback_request(&waveform)?;
        let handle = self.backend.play(request)?;

        info!(%kind, samples = waveform.len(), "Playback started");
        let completion = handle.completion();
        Ok(ActivePlayback {
            stimulus,
            handle,
            completion,
        })
    }
}
