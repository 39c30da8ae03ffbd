//! # cropcast-sharer — sharing-side process
//!
//! Captures a stream, renders the selected fixed-size crop in real
//! time, and delivers it to a `cropcast-viewer` over TCP. Optionally
//! autosaves the current crop to a directory on a fixed interval.
//!
//! The capture source in this binary is the synthetic test pattern;
//! real OS capture backends plug in through the same seam.

pub mod config;
pub mod service;
