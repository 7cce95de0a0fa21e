/// Command-channel requests and responses.
pub mod command;
/// Health endpoint payload.
pub mod health;
/// SOS telemetry events.
pub mod telemetry;
