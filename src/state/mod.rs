/// Backend sessions and connection states.
pub mod connections;
/// Pending hide table.
pub mod hide_timers;
/// Match registry.
pub mod matches;
/// Media naming rules.
pub mod media;

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{MixerConnector, TelemetryConnector},
    config::AppConfig,
};

pub use self::connections::{ConnectionError, ConnectionManager, ConnectionState};
pub use self::hide_timers::{HideKey, HideTimers};
pub use self::matches::{Match, MatchEntry, MatchRegistry, RegistryError};

/// Cheaply clonable handle on [`AppState`].
pub type SharedState = Arc<AppState>;

/// Context handed to every component: configuration, match registry, backend sessions and pending hides.
pub struct AppState {
    config: Arc<AppConfig>,
    matches: RwLock<MatchRegistry>,
    connections: ConnectionManager,
    hide_timers: HideTimers,
    shutdown: CancellationToken,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// Every backend starts `disconnected`; the match registry is seeded from the configuration.
    pub fn new(
        config: AppConfig,
        mixer_connector: Arc<dyn MixerConnector>,
        telemetry_connector: Arc<dyn TelemetryConnector>,
    ) -> SharedState {
        let connections = ConnectionManager::new(&config, mixer_connector, telemetry_connector);
        let matches = MatchRegistry::new(config.matches.clone(), config.current_match);
        Arc::new(Self {
            config: Arc::new(config),
            matches: RwLock::new(matches),
            connections,
            hide_timers: HideTimers::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Loaded configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Match registry; write access is only needed by `set_match`.
    pub fn matches(&self) -> &RwLock<MatchRegistry> {
        &self.matches
    }

    /// Backend sessions.
    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Pending hides.
    pub fn hide_timers(&self) -> &HideTimers {
        &self.hide_timers
    }

    /// Root cancellation token, cancelled once on process shutdown.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }
}
