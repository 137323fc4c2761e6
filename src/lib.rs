//! Stillcast - live HLS streams from still images
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod server;
pub mod sources;
pub mod streaming;
