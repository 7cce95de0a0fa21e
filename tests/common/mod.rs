#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::{
    FutureExt, StreamExt,
    future::{BoxFuture, ready},
    stream,
};
use obs_match_director::{
    backend::{
        BackendRole, MixerConnector, MixerError, MixerResult, SceneItem, TelemetryConnector,
        TelemetryError, TelemetryFeed, VideoMixer,
    },
    config::{AppConfig, EndpointConfig},
    state::{AppState, Match, SharedState},
};
use tokio::{sync::watch, time::Instant};

pub const PRIMARY_PORT: u16 = 4455;
pub const SECONDARY_PORT: u16 = 4456;
pub const TELEMETRY_PORT: u16 = 49322;

pub const WIN_SCENE: &str = "SCN Win Animation";
pub const MATCHUP_SCENE: &str = "SCN Matchup Animation";
pub const AUDIO_SCENE: &str = "SCN Musik-Output";
pub const GOAL_SCENE: &str = "SCN Goal Video";
pub const WIN_AUDIO: &str = "MED Game Win Stinger Audio";

/// One request received by a [`FakeMixer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerCall {
    List { scene: String },
    Show { scene: String, source: String },
    Hide { scene: String, source: String },
    Restart { source: String },
}

/// In-memory video mixer recording every call with the (paused) clock time.
pub struct FakeMixer {
    scenes: HashMap<String, Vec<SceneItem>>,
    calls: Mutex<Vec<(Instant, MixerCall)>>,
    connected: watch::Sender<bool>,
}

impl FakeMixer {
    /// Mixer exposing `scenes` as (scene, sources) pairs.
    pub fn new(scenes: &[(&str, &[&str])]) -> Arc<Self> {
        let mut next_id = 0;
        let scenes = scenes
            .iter()
            .map(|(scene, sources)| {
                let items = sources
                    .iter()
                    .map(|source| {
                        next_id += 1;
                        SceneItem {
                            id: next_id,
                            source_name: source.to_string(),
                        }
                    })
                    .collect();
                (scene.to_string(), items)
            })
            .collect();
        let (connected, _) = watch::channel(true);
        Arc::new(Self {
            scenes,
            calls: Mutex::new(Vec::new()),
            connected,
        })
    }

    /// Mixer with the default production scene layout.
    pub fn tournament() -> Arc<Self> {
        Self::new(&[
            (
                WIN_SCENE,
                &["WIN HSMW BLAU.mp4", "WIN HSMW PINK.mp4", "WIN LES BLAU.mp4", "WIN LES PINK.mp4"],
            ),
            (MATCHUP_SCENE, &["HSMW vs LES.mp4", "UIA vs WHZ.mp4"]),
            (
                AUDIO_SCENE,
                &[
                    WIN_AUDIO,
                    "MED Matchup Audio",
                    "MED Matchup Audio Finale",
                    "MED Goal Audio",
                ],
            ),
            (GOAL_SCENE, &["MED Goal Video"]),
        ])
    }

    /// Simulate the transport closing.
    pub fn disconnect(&self) {
        self.connected.send_replace(false);
    }

    pub fn calls(&self) -> Vec<MixerCall> {
        self.timed_calls().into_iter().map(|(_, call)| call).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, MixerCall)> {
        self.calls.lock().unwrap().clone()
    }

    /// Times at which `source` was hidden.
    pub fn hides_of(&self, source: &str) -> Vec<Instant> {
        self.timed_calls()
            .into_iter()
            .filter_map(|(at, call)| match call {
                MixerCall::Hide { source: hidden, .. } if hidden == source => Some(at),
                _ => None,
            })
            .collect()
    }

    /// Number of times `source` was shown.
    pub fn shows_of(&self, source: &str) -> usize {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, MixerCall::Show { source: shown, .. } if shown == source))
            .count()
    }

    fn record(&self, call: MixerCall) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }

    fn source_of(&self, scene: &str, item_id: i64) -> String {
        self.scenes
            .get(scene)
            .and_then(|items| items.iter().find(|item| item.id == item_id))
            .map(|item| item.source_name.clone())
            .unwrap_or_default()
    }

    fn check_connected(&self) -> MixerResult<()> {
        if *self.connected.borrow() {
            Ok(())
        } else {
            Err(MixerError::Disconnected)
        }
    }
}

impl VideoMixer for FakeMixer {
    fn scene_items(&self, scene: &str) -> BoxFuture<'static, MixerResult<Vec<SceneItem>>> {
        let result = self.check_connected().and_then(|()| {
            self.record(MixerCall::List {
                scene: scene.to_string(),
            });
            self.scenes
                .get(scene)
                .cloned()
                .ok_or_else(|| MixerError::SceneNotFound(scene.to_string()))
        });
        ready(result).boxed()
    }

    fn set_item_visible(
        &self,
        scene: &str,
        item_id: i64,
        visible: bool,
    ) -> BoxFuture<'static, MixerResult<()>> {
        let result = self.check_connected().map(|()| {
            let source = self.source_of(scene, item_id);
            let scene = scene.to_string();
            self.record(if visible {
                MixerCall::Show { scene, source }
            } else {
                MixerCall::Hide { scene, source }
            });
        });
        ready(result).boxed()
    }

    fn restart_media(&self, source: &str) -> BoxFuture<'static, MixerResult<()>> {
        let result = self.check_connected().map(|()| {
            self.record(MixerCall::Restart {
                source: source.to_string(),
            })
        });
        ready(result).boxed()
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        let mut connected = self.connected.subscribe();
        async move {
            let _ = connected.wait_for(|connected| !*connected).await;
        }
        .boxed()
    }
}

/// Hands out [`FakeMixer`]s by endpoint port.
#[derive(Default)]
pub struct FakeMixerConnector {
    mixers: Mutex<HashMap<u16, Arc<FakeMixer>>>,
    attempts: Mutex<HashMap<u16, u32>>,
}

impl FakeMixerConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `mixer` reachable on `port`.
    pub fn install(&self, port: u16, mixer: Arc<FakeMixer>) {
        self.mixers.lock().unwrap().insert(port, mixer);
    }

    /// Connection attempts made against `port`.
    pub fn attempts(&self, port: u16) -> u32 {
        self.attempts.lock().unwrap().get(&port).copied().unwrap_or(0)
    }
}

impl MixerConnector for FakeMixerConnector {
    fn connect(&self, endpoint: &EndpointConfig) -> BoxFuture<'static, MixerResult<Arc<dyn VideoMixer>>> {
        *self.attempts.lock().unwrap().entry(endpoint.port).or_default() += 1;
        let result = match self.mixers.lock().unwrap().get(&endpoint.port) {
            Some(mixer) if mixer.is_connected() => Ok(mixer.clone() as Arc<dyn VideoMixer>),
            _ => Err(MixerError::Handshake("connection refused".into())),
        };
        ready(result).boxed()
    }
}

/// Scripted telemetry session.
pub struct FeedScript {
    frames: Vec<String>,
    stay_open: bool,
}

impl FeedScript {
    /// Deliver `frames`, then end the session.
    pub fn ending(frames: &[&str]) -> Self {
        Self {
            frames: frames.iter().map(|frame| frame.to_string()).collect(),
            stay_open: false,
        }
    }

    /// Deliver `frames`, then stay silent forever.
    pub fn open(frames: &[&str]) -> Self {
        Self {
            stay_open: true,
            ..Self::ending(frames)
        }
    }

    fn into_feed(self) -> TelemetryFeed {
        let frames = stream::iter(self.frames.into_iter().map(Ok::<_, TelemetryError>));
        if self.stay_open {
            frames.chain(stream::pending()).boxed()
        } else {
            frames.boxed()
        }
    }
}

/// Hands out scripted telemetry sessions in order; refuses once the queue is empty.
#[derive(Default)]
pub struct FakeTelemetryConnector {
    scripts: Mutex<VecDeque<FeedScript>>,
    attempts: Mutex<u32>,
}

impl FakeTelemetryConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, script: FeedScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().unwrap()
    }
}

impl TelemetryConnector for FakeTelemetryConnector {
    fn connect(&self, _endpoint: &EndpointConfig) -> BoxFuture<'static, Result<TelemetryFeed, TelemetryError>> {
        *self.attempts.lock().unwrap() += 1;
        let result = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .map(FeedScript::into_feed)
            .ok_or_else(|| TelemetryError::Connect("connection refused".into()));
        ready(result).boxed()
    }
}

/// Default config pointed at the fake ports, with a single `HSMW` vs `LES` match.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.video_mixer_primary.port = PRIMARY_PORT;
    config.video_mixer_secondary = Some(EndpointConfig {
        host: "localhost".into(),
        port: SECONDARY_PORT,
        password: None,
    });
    config.telemetry.port = TELEMETRY_PORT;
    config.retry.delay_secs = 1.0;
    config.retry.startup_max_attempts = 3;
    config.command_channel.port = 0;
    config.matches = vec![Match::new("HSMW", "LES")];
    config.current_match = 0;
    config
}

pub struct Harness {
    pub state: SharedState,
    pub mixers: Arc<FakeMixerConnector>,
    pub telemetry: Arc<FakeTelemetryConnector>,
}

impl Harness {
    pub fn new(config: AppConfig) -> Self {
        let mixers = FakeMixerConnector::new();
        let telemetry = FakeTelemetryConnector::new();
        let state = AppState::new(config, mixers.clone(), telemetry.clone());
        Self {
            state,
            mixers,
            telemetry,
        }
    }

    /// Install `mixer` on the port of `role` and connect it.
    pub async fn attach(&self, role: BackendRole, mixer: Arc<FakeMixer>) {
        let port = match role {
            BackendRole::VideoMixerPrimary => PRIMARY_PORT,
            BackendRole::VideoMixerSecondary => SECONDARY_PORT,
            BackendRole::Telemetry => TELEMETRY_PORT,
        };
        self.mixers.install(port, mixer);
        self.state
            .connections()
            .connect_mixer(role)
            .await
            .expect("fake mixer connects");
    }
}

/// Let spawned tasks and timers run for `duration` of (paused) time.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
