//! Application-level configuration loading: backend endpoints, scene names, delays and matches.

use std::{collections::HashMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::matches::Match;

/// Default location on disk where the director looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "OBS_MATCH_DIRECTOR_CONFIG_PATH";

const OBS_WEBSOCKET_PORT: u16 = 4455;
const SOS_WEBSOCKET_PORT: u16 = 49322;
const COMMAND_CHANNEL_PORT: u16 = 55555;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Video mixer that always receives playback.
    pub video_mixer_primary: EndpointConfig,
    /// Optional second video mixer (monitoring output). `null` disables the role.
    pub video_mixer_secondary: Option<EndpointConfig>,
    /// Telemetry (match events) endpoint.
    pub telemetry: EndpointConfig,
    /// Listening socket for the external control surface.
    pub command_channel: CommandChannelConfig,
    /// Scene and source names on the video mixers.
    pub scenes: SceneConfig,
    /// Hide delays per media kind.
    pub delays: DelayConfig,
    /// Reconnection policy.
    pub retry: RetryConfig,
    /// Team vocabulary accepted when resolving victory videos.
    pub teams: Vec<String>,
    /// Team name substitutions applied when building matchup video names.
    pub matchup_aliases: HashMap<String, String>,
    /// Index of the match selected at startup.
    pub current_match: usize,
    /// Ordered list of configured matches.
    pub matches: Vec<Match>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to the built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        matches = config.matches.len(),
                        teams = config.teams.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            video_mixer_primary: EndpointConfig::local(OBS_WEBSOCKET_PORT),
            video_mixer_secondary: Some(EndpointConfig::local(OBS_WEBSOCKET_PORT)),
            telemetry: EndpointConfig::local(SOS_WEBSOCKET_PORT),
            command_channel: CommandChannelConfig::default(),
            scenes: SceneConfig::default(),
            delays: DelayConfig::default(),
            retry: RetryConfig::default(),
            teams: default_teams(),
            matchup_aliases: default_matchup_aliases(),
            current_match: 0,
            matches: default_matches(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
/// Host, port and optional credential of one backend.
pub struct EndpointConfig {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Opaque credential; an empty string means "no password".
    #[serde(default)]
    pub password: Option<String>,
}

impl EndpointConfig {
    fn local(port: u16) -> Self {
        Self {
            host: "localhost".into(),
            port,
            password: None,
        }
    }

    /// WebSocket URL of the endpoint.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// Configured password, ignoring empty strings.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Command channel listener settings.
pub struct CommandChannelConfig {
    /// Whether the command server is started at all.
    pub enabled: bool,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for CommandChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".into(),
            port: COMMAND_CHANNEL_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Scene and source names used for playback.
pub struct SceneConfig {
    /// Scene holding one media source per victory video.
    pub win_scene: String,
    /// Scene holding one media source per matchup video.
    pub matchup_scene: String,
    /// Scene holding the audio stingers.
    pub audio_scene: String,
    /// Victory audio stinger source.
    pub audio_source: String,
    /// Matchup audio stinger for regular matches.
    pub matchup_audio_source: String,
    /// Matchup audio stinger for the final match.
    pub matchup_audio_finale_source: String,
    /// Scene holding the goal video.
    pub goal_video_scene: String,
    /// Goal video source.
    pub goal_video_source: String,
    /// Goal audio source (inside [`SceneConfig::audio_scene`]).
    pub goal_audio_source: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            win_scene: "SCN Win Animation".into(),
            matchup_scene: "SCN Matchup Animation".into(),
            audio_scene: "SCN Musik-Output".into(),
            audio_source: "MED Game Win Stinger Audio".into(),
            matchup_audio_source: "MED Matchup Audio".into(),
            matchup_audio_finale_source: "MED Matchup Audio Finale".into(),
            goal_video_scene: "SCN Goal Video".into(),
            goal_video_source: "MED Goal Video".into(),
            goal_audio_source: "MED Goal Audio".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Seconds each kind of media stays visible before it is hidden again.
pub struct DelayConfig {
    /// Victory and goal videos.
    pub video_secs: f64,
    /// Matchup video (full animation length).
    pub matchup_secs: f64,
    /// Audio stingers.
    pub audio_secs: f64,
}

impl DelayConfig {
    /// Hide delay for victory and goal videos.
    pub fn video(&self) -> Duration {
        Duration::from_secs_f64(self.video_secs.max(0.0))
    }

    /// Hide delay for matchup videos.
    pub fn matchup(&self) -> Duration {
        Duration::from_secs_f64(self.matchup_secs.max(0.0))
    }

    /// Hide delay for audio stingers.
    pub fn audio(&self) -> Duration {
        Duration::from_secs_f64(self.audio_secs.max(0.0))
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            video_secs: 10.0,
            matchup_secs: 70.0,
            audio_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
/// Fixed-delay reconnection policy.
pub struct RetryConfig {
    /// Seconds between two connection attempts.
    pub delay_secs: f64,
    /// Attempts per backend during startup; `0` retries forever.
    pub startup_max_attempts: u32,
}

impl RetryConfig {
    /// Delay between two connection attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_secs.max(0.0))
    }

    /// Attempt cap applied during startup, `None` when unbounded.
    pub fn startup_limit(&self) -> Option<u32> {
        (self.startup_max_attempts > 0).then_some(self.startup_max_attempts)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay_secs: 5.0,
            startup_max_attempts: 12,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_teams() -> Vec<String> {
    ["HSMW", "LES", "UIA A", "UIA B", "WHZ", "TLU"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_matchup_aliases() -> HashMap<String, String> {
    HashMap::from([
        ("UIA A".to_string(), "UIA".to_string()),
        ("UIA B".to_string(), "UIA".to_string()),
    ])
}

fn default_matches() -> Vec<Match> {
    [
        ("HSMW", "UIA B"),
        ("TLU", "WHZ"),
        ("LES", "UIA B"),
        ("TLU", "UIA A"),
        ("HSMW", "LES"),
        ("UIA A", "WHZ"),
        ("HSMW", "HSMW"),
    ]
    .into_iter()
    .map(|(blue, orange)| Match::new(blue, orange))
    .collect()
}
