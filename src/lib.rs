//! Library crate for obs-match-director, exposing modules for the binary and integration tests.

/// Video-mixer and telemetry protocol clients.
pub mod backend;
/// Configuration loading and defaults.
pub mod config;
/// Wire formats of the command channel, telemetry and health.
pub mod dto;
/// Playback and command-channel errors.
pub mod error;
/// HTTP and WebSocket routes.
pub mod routes;
/// Connection, playback, telemetry and command services.
pub mod services;
/// Shared application state.
pub mod state;
