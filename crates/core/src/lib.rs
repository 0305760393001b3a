//! Core library for the calibration stimulus tool
//!
//! Everything here is platform-independent: stimulus synthesis, the parameter
//! store, the menu model shared by the front ends, and the playback contract
//! that the `infra` crate implements on top of real audio hardware.

pub mod domain;
