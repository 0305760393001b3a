//! Audio device abstractions and the playback contract
//!
//! This module defines the platform-agnostic side of playback: device
//! identifiers, the request handed to a backend, and the traits a backend
//! implements. The cpal implementation lives in the `infra` crate.

use crate::domain::routing::ChannelRouting;
use crossbeam::channel::Receiver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the audio subsystem
#[derive(Debug, Error)]
pub enum AudioError {
    /// Requested audio device was not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Error in audio stream creation or processing
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Invalid configuration for audio device
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input/Output error at the OS level
    #[error("OS error: {0}")]
    OsError(String),

    /// Device does not support the requested configuration
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// Output channel is not one of the device's channels
    #[error("Invalid routing: output channel {output_channel} not in 1..={channels}")]
    InvalidRouting { output_channel: i64, channels: i64 },
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Integer identifier of an output device: its position in the host's device list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(usize);

impl DeviceId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Information about an output device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    /// Largest channel count among the supported output configurations
    pub max_output_channels: u16,
    pub default_sample_rate: Option<u32>,
}

/// Trait for enumerating available output devices
pub trait AudioEnumerator {
    /// List output devices in host order; `DeviceId` is the position in this list
    fn output_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Find a device by its id
    fn device_by_id(&self, id: DeviceId) -> Result<DeviceInfo> {
        self.output_devices()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| AudioError::DeviceNotFound(format!("no output device with id {}", id)))
    }
}

/// Everything a backend needs to play one waveform on one channel
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub device: DeviceId,
    pub channels: u16,
    /// 1-based output channel index
    pub output_channel: u16,
    pub sample_rate: u32,
    pub waveform: Arc<[f32]>,
}

impl PlaybackRequest {
    /// Build a request from raw parameter values, checking the routing precondition
    pub fn new(
        device: DeviceId,
        channels: i64,
        output_channel: i64,
        sample_rate: f64,
        waveform: &[f64],
    ) -> Result<Self> {
        if channels < 1 || output_channel < 1 || output_channel > channels {
            return Err(AudioError::InvalidRouting {
                output_channel,
                channels,
            });
        }
        let channels = u16::try_from(channels).map_err(|_| {
            AudioError::UnsupportedConfiguration(format!("{} output channels", channels))
        })?;
        if !(sample_rate.is_finite() && sample_rate >= 1.0 && sample_rate <= u32::MAX as f64) {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate {} Hz",
                sample_rate
            )));
        }

        Ok(Self {
            device,
            channels,
            output_channel: output_channel as u16,
            sample_rate: sample_rate.round() as u32,
            waveform: waveform.iter().map(|&s| s as f32).collect(),
        })
    }

    /// The one-hot mix matrix for this request
    pub fn routing(&self) -> Result<ChannelRouting> {
        ChannelRouting::one_hot(self.channels, self.output_channel)
    }

    /// Length of the waveform in seconds
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.waveform.len() as f64 / self.sample_rate as f64)
    }
}

/// How a playback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Finished,
    Cancelled,
    Failed(String),
}

/// A playback in progress
///
/// Completion is reported through `completion()`, which yields exactly one
/// outcome. `is_playing` remains available for callers that prefer polling.
pub trait PlaybackHandle {
    /// Whether the stream is still producing the waveform
    fn is_playing(&self) -> bool;

    /// Stop playback early; the completion channel then yields `Cancelled`
    fn cancel(&self);

    /// Receiver for the single completion notification
    fn completion(&self) -> Receiver<PlaybackOutcome>;

    /// Block until playback is over, checking `is_playing` every `interval`
    fn wait_polling(&self, interval: Duration) {
        while self.is_playing() {
            thread::sleep(interval);
        }
    }
}

/// Something that can start playback of a finished waveform
pub trait PlaybackBackend {
    type Handle: PlaybackHandle;

    /// Open the device, route the waveform and start playing (non-blocking)
    fn play(&self, request: PlaybackRequest) -> Result<Self::Handle>;
}
