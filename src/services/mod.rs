/// Command-channel sessions and command execution.
pub mod command_service;
/// Connection retry loops and mixer supervision.
pub mod connection_supervisor;
/// Health check service.
pub mod health_service;
/// Media playback with deferred hides.
pub mod playback_service;
/// Backend connection policy at startup.
pub mod startup;
/// Telemetry listener loop.
pub mod telemetry_service;
