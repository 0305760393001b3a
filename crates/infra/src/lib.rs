//! Hardware adapters for the calibration tool
//!
//! Implements the core playback contract on top of CPAL.

pub mod audio;
