//! Output devices and playback through CPAL
//!
//! CPAL picks the native host API (WASAPI, CoreAudio, ALSA). Devices are
//! addressed by their position in the host's output device list.

pub mod cpal_backend;
pub mod playback;

pub use cpal_backend::CpalEnumerator;
pub use playback::{CpalBackend, CpalPlayback};
