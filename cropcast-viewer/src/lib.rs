//! Cropcast viewer — shared library.
//!
//! The viewer binary accepts one sharer at a time and presents the
//! delivered crop frames. [`surface`] holds the per-session
//! presentation state; [`config`] the TOML settings.

pub mod config;
pub mod surface;
