//! Output channel routing and the sample feed shared by playback backends
//!
//! A stimulus is a mono waveform. The device stream is interleaved with one
//! slot per output channel, so every frame carries the same sample scaled by
//! the mix matrix row for that channel. Only one row is ever non-zero.

use crate::domain::audio::{AudioError, PlaybackHandle, PlaybackOutcome, PlaybackRequest, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Mix matrix from one synthesized channel to the device's output channels
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRouting {
    gains: Vec<f32>,
}

impl ChannelRouting {
    /// One-hot routing: `1.0` at `output_channel - 1`, `0.0` elsewhere
    ///
    /// `output_channel` is 1-based and must not exceed `channels`.
    pub fn one_hot(channels: u16, output_channel: u16) -> Result<Self> {
        if channels == 0 || output_channel == 0 || output_channel > channels {
            return Err(AudioError::InvalidRouting {
                output_channel: output_channel.into(),
                channels: channels.into(),
            });
        }

        let mut gains = vec![0.0; channels as usize];
        gains[output_channel as usize - 1] = 1.0;
        Ok(Self { gains })
    }

    pub fn channels(&self) -> usize {
        self.gains.len()
    }

    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    /// Zero-based index of the channel that carries the signal
    pub fn active_channel(&self) -> Option<usize> {
        self.gains.iter().position(|&g| g != 0.0)
    }
}

#[derive(Debug, Default)]
struct PlaybackShared {
    playing: AtomicBool,
    cancelled: AtomicBool,
}

/// Producer side of a playback: lives inside the audio callback
pub struct PlaybackFeed {
    waveform: Arc<[f32]>,
    routing: ChannelRouting,
    position: usize,
    shared: Arc<PlaybackShared>,
    done_tx: Option<Sender<PlaybackOutcome>>,
}

impl PlaybackFeed {
    /// Fill an interleaved output buffer with the next frames
    ///
    /// Once the waveform is exhausted or playback was cancelled, the rest of
    /// the buffer (and every later buffer) is silence.
    pub fn fill(&mut self, out: &mut [f32]) {
        if self.shared.cancelled.load(Ordering::Acquire) {
            out.fill(0.0);
            self.finish(PlaybackOutcome::Cancelled);
            return;
        }

        let gains = self.routing.gains();
        for frame in out.chunks_mut(gains.len()) {
            match self.waveform.get(self.position) {
                Some(&sample) => {
                    for (slot, gain) in frame.iter_mut().zip(gains) {
                        *slot = sample * gain;
                    }
                    self.position += 1;
                }
                None => frame.fill(0.0),
            }
        }

        if self.position >= self.waveform.len() {
            self.finish(PlaybackOutcome::Finished);
        }
    }

    /// Report a stream failure as the outcome of this playback
    pub fn fail(&mut self, reason: String) {
        self.finish(PlaybackOutcome::Failed(reason));
    }

    /// Frames already handed to the device
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_done(&self) -> bool {
        self.done_tx.is_none()
    }

    fn finish(&mut self, outcome: PlaybackOutcome) {
        if let Some(tx) = self.done_tx.take() {
            debug!(?outcome, frames = self.position, "Playback feed finished");
            // Outcome first: pollers that see `playing == false` can read it
            let _ = tx.try_send(outcome);
            self.shared.playing.store(false, Ordering::Release);
        }
    }
}

/// Consumer side of a playback: held by the UI
#[derive(Debug, Clone)]
pub struct PlaybackControl {
    shared: Arc<PlaybackShared>,
    done_rx: Receiver<PlaybackOutcome>,
}

impl PlaybackHandle for PlaybackControl {
    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }

    fn completion(&self) -> Receiver<PlaybackOutcome> {
        self.done_rx.clone()
    }
}

/// Create the connected feed/control pair for a request
pub fn playback_pair(request: &PlaybackRequest) -> Result<(PlaybackFeed, PlaybackControl)> {
    let routing = request.routing()?;
    let shared = Arc::new(PlaybackShared {
        playing: AtomicBool::new(true),
        cancelled: AtomicBool::new(false),
    });
    let (done_tx, done_rx) = bounded(1);

    let feed = PlaybackFeed {
        waveform: Arc::clone(&request.waveform),
        routing,
        position: 0,
        shared: Arc::clone(&shared),
        done_tx: Some(done_tx),
    };

    Ok((feed, PlaybackControl { shared, done_rx }))
}
