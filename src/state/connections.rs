//! Ownership of the three backend sessions and their connection state.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    backend::{
        BackendRole, MixerConnector, MixerError, TelemetryConnector, TelemetryError,
        TelemetryFeed, VideoMixer,
    },
    config::{AppConfig, EndpointConfig},
};

/// Lifecycle of a backend session as reported to dependents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session; nothing is being attempted.
    Disconnected,
    /// An attempt is in flight.
    Connecting,
    /// Session is usable.
    Connected,
    /// Last attempt failed; the next one happens after the retry delay.
    Failed,
}

/// A single connection attempt failed.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// The role has no endpoint in the configuration.
    #[error("{0} is not configured")]
    NotConfigured(BackendRole),
    /// The video mixer could not be reached or refused the handshake.
    #[error("{role} connection failed: {reason}")]
    Mixer {
        /// Role that failed.
        role: BackendRole,
        /// Underlying error.
        #[source]
        reason: MixerError,
    },
    /// The telemetry source could not be reached.
    #[error("{role} connection failed: {reason}")]
    Telemetry {
        /// Role that failed.
        role: BackendRole,
        /// Underlying error.
        #[source]
        reason: TelemetryError,
    },
}

/// Holds the live sessions; the only component allowed to open or drop them.
pub struct ConnectionManager {
    primary: EndpointConfig,
    secondary: Option<EndpointConfig>,
    telemetry: EndpointConfig,
    mixer_connector: Arc<dyn MixerConnector>,
    telemetry_connector: Arc<dyn TelemetryConnector>,
    mixers: DashMap<BackendRole, Arc<dyn VideoMixer>>,
    states: DashMap<BackendRole, ConnectionState>,
}

impl ConnectionManager {
    /// Describe every configured role as `disconnected`.
    pub fn new(
        config: &AppConfig,
        mixer_connector: Arc<dyn MixerConnector>,
        telemetry_connector: Arc<dyn TelemetryConnector>,
    ) -> Self {
        let manager = Self {
            primary: config.video_mixer_primary.clone(),
            secondary: config.video_mixer_secondary.clone(),
            telemetry: config.telemetry.clone(),
            mixer_connector,
            telemetry_connector,
            mixers: DashMap::new(),
            states: DashMap::new(),
        };
        for role in manager.configured_roles() {
            manager.states.insert(role, ConnectionState::Disconnected);
        }
        manager
    }

    /// Endpoint configured for `role`.
    pub fn endpoint(&self, role: BackendRole) -> Option<&EndpointConfig> {
        match role {
            BackendRole::VideoMixerPrimary => Some(&self.primary),
            BackendRole::VideoMixerSecondary => self.secondary.as_ref(),
            BackendRole::Telemetry => Some(&self.telemetry),
        }
    }

    /// Whether `role` has an endpoint.
    pub fn is_configured(&self, role: BackendRole) -> bool {
        self.endpoint(role).is_some()
    }

    /// Configured roles in a stable order.
    pub fn configured_roles(&self) -> Vec<BackendRole> {
        [
            BackendRole::VideoMixerPrimary,
            BackendRole::VideoMixerSecondary,
            BackendRole::Telemetry,
        ]
        .into_iter()
        .filter(|role| self.is_configured(*role))
        .collect()
    }

    /// Configured video-mixer roles.
    pub fn configured_mixers(&self) -> Vec<BackendRole> {
        BackendRole::MIXERS
            .into_iter()
            .filter(|role| self.is_configured(*role))
            .collect()
    }

    /// Make a single attempt to open the video-mixer session for `role`.
    ///
    /// On success the session replaces any previous one for the role.
    pub async fn connect_mixer(
        &self,
        role: BackendRole,
    ) -> Result<Arc<dyn VideoMixer>, ConnectionError> {
        let endpoint = self
            .endpoint(role)
            .filter(|_| role != BackendRole::Telemetry)
            .ok_or(ConnectionError::NotConfigured(role))?;
        self.set_state(role, ConnectionState::Connecting);
        debug!(%role, url = %endpoint.url(), "connecting to video mixer");

        match self.mixer_connector.connect(endpoint).await {
            Ok(mixer) => {
                self.mixers.insert(role, mixer.clone());
                self.set_state(role, ConnectionState::Connected);
                info!(%role, url = %endpoint.url(), "video mixer connected");
                Ok(mixer)
            }
            Err(reason) => {
                self.mixers.remove(&role);
                self.set_state(role, ConnectionState::Failed);
                Err(ConnectionError::Mixer { role, reason })
            }
        }
    }

    /// Make a single attempt to open the telemetry session.
    pub async fn connect_telemetry(&self) -> Result<TelemetryFeed, ConnectionError> {
        let role = BackendRole::Telemetry;
        self.set_state(role, ConnectionState::Connecting);
        debug!(%role, url = %self.telemetry.url(), "connecting to telemetry source");

        match self.telemetry_connector.connect(&self.telemetry).await {
            Ok(feed) => {
                self.set_state(role, ConnectionState::Connected);
                info!(%role, url = %self.telemetry.url(), "telemetry source connected");
                Ok(feed)
            }
            Err(reason) => {
                self.set_state(role, ConnectionState::Failed);
                Err(ConnectionError::Telemetry { role, reason })
            }
        }
    }

    /// Session for `role` if it is connected right now.
    ///
    /// A session whose transport has closed is discarded and the role is marked
    /// `disconnected`, so callers must call this again after every suspension point.
    pub fn mixer(&self, role: BackendRole) -> Option<Arc<dyn VideoMixer>> {
        let mixer = self.mixers.get(&role).map(|entry| entry.value().clone())?;
        if mixer.is_connected() {
            return Some(mixer);
        }
        self.drop_mixer(role, &mixer);
        None
    }

    /// Connected video mixers in playback order.
    pub fn available_mixers(&self) -> Vec<(BackendRole, Arc<dyn VideoMixer>)> {
        BackendRole::MIXERS
            .into_iter()
            .filter_map(|role| self.mixer(role).map(|mixer| (role, mixer)))
            .collect()
    }

    /// Forget the session of `role` after its transport ended.
    pub fn mark_disconnected(&self, role: BackendRole) {
        if role != BackendRole::Telemetry {
            self.mixers.remove(&role);
        }
        if self.state(role) != ConnectionState::Disconnected {
            warn!(%role, "backend session lost");
        }
        self.set_state(role, ConnectionState::Disconnected);
    }

    /// Current state of `role`.
    pub fn state(&self, role: BackendRole) -> ConnectionState {
        self.states
            .get(&role)
            .map(|entry| *entry.value())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// `(role, state)` for every configured role.
    pub fn states(&self) -> Vec<(BackendRole, ConnectionState)> {
        self.configured_roles()
            .into_iter()
            .map(|role| (role, self.state(role)))
            .collect()
    }

    /// Close every session (shutdown).
    pub fn disconnect_all(&self) {
        self.mixers.clear();
        for role in self.configured_roles() {
            self.set_state(role, ConnectionState::Disconnected);
        }
    }

    fn drop_mixer(&self, role: BackendRole, stale: &Arc<dyn VideoMixer>) {
        let removed = self
            .mixers
            .remove_if(&role, |_, current| Arc::ptr_eq(current, stale))
            .is_some();
        if removed {
            warn!(%role, "video mixer session closed");
            self.set_state(role, ConnectionState::Disconnected);
        }
    }

    fn set_state(&self, role: BackendRole, state: ConnectionState) {
        self.states.insert(role, state);
    }
}
