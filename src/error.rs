use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    backend::{BackendRole, MixerError},
    state::{matches::RegistryError, media::MediaError},
};

/// Errors raised by playback operations.
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    /// Scene or source is missing on a connected mixer (configuration mismatch).
    #[error("source '{source_name}' not found in scene '{scene}' on {backend}")]
    SourceNotFound {
        /// Mixer that was searched.
        backend: BackendRole,
        /// Scene that was searched.
        scene: String,
        /// Source that was looked up.
        source_name: String,
    },
    /// The mixer is not connected (or dropped mid-operation).
    #[error("{0} is not connected")]
    BackendUnavailable(BackendRole),
    /// The mixer rejected a request.
    #[error("{backend} rejected the request: {reason}")]
    Backend {
        /// Mixer that failed.
        backend: BackendRole,
        /// Underlying mixer error.
        reason: MixerError,
    },
    /// No match is selected.
    #[error("no current match configured")]
    NoCurrentMatch,
    /// Team or color could not be resolved into a media reference.
    #[error(transparent)]
    InvalidMedia(#[from] MediaError),
}

impl PlaybackError {
    /// Classify a mixer failure for `(backend, scene, source)`.
    pub fn from_mixer(backend: BackendRole, scene: &str, source: &str, err: MixerError) -> Self {
        match err {
            MixerError::NotFound { .. } | MixerError::SceneNotFound(_) => {
                PlaybackError::SourceNotFound {
                    backend,
                    scene: scene.to_string(),
                    source_name: source.to_string(),
                }
            }
            MixerError::Disconnected | MixerError::Timeout(_) => {
                PlaybackError::BackendUnavailable(backend)
            }
            reason => PlaybackError::Backend { backend, reason },
        }
    }
}

impl From<RegistryError> for PlaybackError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NoCurrentMatch | RegistryError::InvalidMatchIndex { .. } => {
                PlaybackError::NoCurrentMatch
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Command-channel errors; each one becomes a `{"status":"error"}` response.
#[derive(Debug, Error)]
pub enum AppError {
    /// Payload is not JSON.
    #[error("Invalid JSON")]
    InvalidJson,
    /// Command name is not supported.
    #[error(
        "Unknown command: {0}. Valid commands: play_matchup, play_video, play_audio, trigger_win, set_match, get_current_match, list_matches, hide_matchup"
    )]
    UnknownCommand(String),
    /// Missing or malformed parameter.
    #[error("{0}")]
    BadRequest(String),
    /// Match registry rejected the request.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Playback failed.
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
