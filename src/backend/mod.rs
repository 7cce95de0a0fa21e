//! Backend protocols: video mixers (OBS WebSocket) and the telemetry feed (SOS WebSocket).

/// OBS WebSocket v5 client.
pub mod obs;
/// SOS telemetry feed.
pub mod sos;

use std::{fmt, sync::Arc};

use futures::{future::BoxFuture, stream::BoxStream};
use serde::Serialize;
use thiserror::Error;

use crate::config::EndpointConfig;

/// Result alias for video-mixer operations.
pub type MixerResult<T> = Result<T, MixerError>;

/// Lazy, unbounded sequence of raw telemetry frames; ends when the session drops.
pub type TelemetryFeed = BoxStream<'static, Result<String, TelemetryError>>;

/// Role a backend session plays inside the director.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendRole {
    /// Main video mixer (broadcast output).
    VideoMixerPrimary,
    /// Second video mixer (monitoring output).
    VideoMixerSecondary,
    /// Match telemetry source.
    Telemetry,
}

impl BackendRole {
    /// Video-mixer roles in playback order.
    pub const MIXERS: [BackendRole; 2] = [
        BackendRole::VideoMixerPrimary,
        BackendRole::VideoMixerSecondary,
    ];

    /// Stable name used in logs and health output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VideoMixerPrimary => "video-mixer-primary",
            Self::VideoMixerSecondary => "video-mixer-secondary",
            Self::Telemetry => "telemetry",
        }
    }
}

impl fmt::Display for BackendRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a video mixer session.
#[derive(Debug, Clone, Error)]
pub enum MixerError {
    /// The session's transport is gone.
    #[error("video mixer disconnected")]
    Disconnected,
    /// No response arrived in time.
    #[error("video mixer request `{0}` timed out")]
    Timeout(String),
    /// Scene or source does not exist on the mixer.
    #[error("source '{source_name}' not found in scene '{scene}'")]
    NotFound {
        /// Scene that was searched.
        scene: String,
        /// Source that was looked up.
        source_name: String,
    },
    /// Scene does not exist on the mixer.
    #[error("scene '{0}' not found")]
    SceneNotFound(String),
    /// The mixer rejected a request.
    #[error("request `{request_type}` failed with code {code}: {comment}")]
    Request {
        /// Request type sent to the mixer.
        request_type: String,
        /// Status code returned by the mixer.
        code: u16,
        /// Human-readable comment returned by the mixer.
        comment: String,
    },
    /// The mixer requires a password but none is configured.
    #[error("video mixer requires authentication but no password is configured")]
    AuthenticationRequired,
    /// Connection or handshake failure.
    #[error("video mixer handshake failed: {0}")]
    Handshake(String),
    /// Unexpected payload.
    #[error("video mixer protocol error: {0}")]
    Protocol(String),
}

/// Error raised by the telemetry transport.
#[derive(Debug, Clone, Error)]
pub enum TelemetryError {
    /// Could not open the session.
    #[error("telemetry connection failed: {0}")]
    Connect(String),
    /// The open session failed.
    #[error("telemetry transport error: {0}")]
    Transport(String),
}

/// One item of a mixer scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneItem {
    /// Mixer-assigned identifier.
    pub id: i64,
    /// Name of the source backing the item.
    pub source_name: String,
}

/// Live session with a video mixer.
///
/// Methods return owned futures so callers never hold a borrow of the session
/// across a suspension point.
pub trait VideoMixer: Send + Sync {
    /// Items of `scene` in the mixer's current scene graph.
    fn scene_items(&self, scene: &str) -> BoxFuture<'static, MixerResult<Vec<SceneItem>>>;
    /// Show or hide an item.
    fn set_item_visible(
        &self,
        scene: &str,
        item_id: i64,
        visible: bool,
    ) -> BoxFuture<'static, MixerResult<()>>;
    /// Restart a media source from the beginning.
    fn restart_media(&self, source: &str) -> BoxFuture<'static, MixerResult<()>>;
    /// Whether the transport is still open.
    fn is_connected(&self) -> bool;
    /// Resolves once the transport has closed.
    fn closed(&self) -> BoxFuture<'static, ()>;

    /// Identifier of the item backed by `source` inside `scene` (exact name match).
    fn get_scene_item(&self, scene: &str, source: &str) -> BoxFuture<'static, MixerResult<i64>> {
        let items = self.scene_items(scene);
        let scene = scene.to_string();
        let source = source.to_string();
        Box::pin(async move {
            items
                .await?
                .into_iter()
                .find(|item| item.source_name == source)
                .map(|item| item.id)
                .ok_or(MixerError::NotFound {
                    scene,
                    source_name: source,
                })
        })
    }
}

/// Opens video-mixer sessions.
pub trait MixerConnector: Send + Sync {
    /// Perform a single connection attempt.
    fn connect(&self, endpoint: &EndpointConfig) -> BoxFuture<'static, MixerResult<Arc<dyn VideoMixer>>>;
}

/// Opens telemetry sessions.
pub trait TelemetryConnector: Send + Sync {
    /// Perform a single connection attempt.
    fn connect(&self, endpoint: &EndpointConfig)
    -> BoxFuture<'static, Result<TelemetryFeed, TelemetryError>>;
}
