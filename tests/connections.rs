//! Startup policy, mixer supervision and health reporting.

mod common;

use std::{sync::Arc, time::Duration};

use common::{
    FakeMixer, FeedScript, Harness, PRIMARY_PORT, SECONDARY_PORT, advance, test_config,
};
use obs_match_director::{
    backend::BackendRole,
    services::{
        connection_supervisor::supervise_mixer,
        health_service,
        startup::{self, StartupError},
    },
    state::ConnectionState,
};
use tokio_util::sync::CancellationToken;

const PRIMARY: BackendRole = BackendRole::VideoMixerPrimary;
const SECONDARY: BackendRole = BackendRole::VideoMixerSecondary;

#[tokio::test(start_paused = true)]
async fn startup_fails_when_no_mixer_is_reachable() {
    let harness = Harness::new(test_config());
    harness.telemetry.push(FeedScript::open(&[]));

    let err = startup::connect_backends(&harness.state, &CancellationToken::new())
        .await
        .err()
        .unwrap();

    assert_eq!(err, StartupError::NoVideoMixer);
    assert_eq!(harness.mixers.attempts(PRIMARY_PORT), 3);
    assert_eq!(harness.mixers.attempts(SECONDARY_PORT), 3);
}

#[tokio::test(start_paused = true)]
async fn startup_fails_when_telemetry_is_unreachable() {
    let harness = Harness::new(test_config());
    harness.mixers.install(PRIMARY_PORT, FakeMixer::tournament());

    let err = startup::connect_backends(&harness.state, &CancellationToken::new())
        .await
        .err()
        .unwrap();

    assert_eq!(err, StartupError::TelemetryUnavailable);
    assert_eq!(harness.telemetry.attempts(), 3);
    assert_eq!(
        harness.state.connections().state(BackendRole::Telemetry),
        ConnectionState::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn startup_proceeds_with_a_single_mixer() {
    let harness = Harness::new(test_config());
    harness.mixers.install(SECONDARY_PORT, FakeMixer::tournament());
    harness.telemetry.push(FeedScript::open(&[]));

    let backends = startup::connect_backends(&harness.state, &CancellationToken::new())
        .await
        .unwrap();

    let connected: Vec<_> = backends
        .mixers
        .iter()
        .map(|(role, session)| (*role, session.is_some()))
        .collect();
    assert_eq!(connected, vec![(PRIMARY, false), (SECONDARY, true)]);
    assert_eq!(harness.state.connections().state(SECONDARY), ConnectionState::Connected);
    assert_eq!(harness.state.connections().state(PRIMARY), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn startup_does_not_wait_for_a_missing_secondary() {
    let mut config = test_config();
    config.retry.startup_max_attempts = 0;
    let harness = Harness::new(config);
    harness.mixers.install(PRIMARY_PORT, FakeMixer::tournament());
    harness.telemetry.push(FeedScript::open(&[]));
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let backends = tokio::time::timeout(
        Duration::from_secs(3600),
        startup::connect_backends(&harness.state, &cancel),
    )
    .await
    .expect("startup returns once primary and telemetry are up")
    .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    let connected: Vec<_> = backends
        .mixers
        .iter()
        .map(|(role, session)| (*role, session.is_some()))
        .collect();
    assert_eq!(connected, vec![(PRIMARY, true), (SECONDARY, false)]);
    assert_eq!(harness.mixers.attempts(SECONDARY_PORT), 1);

    let supervisors = startup::spawn_mixer_supervisors(&harness.state, backends.mixers, &cancel);
    advance(Duration::from_millis(2_500)).await;
    assert_eq!(harness.mixers.attempts(SECONDARY_PORT), 4);

    harness.mixers.install(SECONDARY_PORT, FakeMixer::tournament());
    advance(Duration::from_secs(1)).await;
    assert_eq!(harness.state.connections().state(SECONDARY), ConnectionState::Connected);
    assert_eq!(harness.state.connections().available_mixers().len(), 2);

    cancel.cancel();
    for supervisor in supervisors {
        supervisor.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn startup_retries_until_backends_appear() {
    let harness = Harness::new(test_config());
    harness.telemetry.push(FeedScript::open(&[]));
    let state = harness.state.clone();
    let attempt = tokio::spawn(async move {
        startup::connect_backends(&state, &CancellationToken::new())
            .await
            .map(|_| ())
    });

    advance(Duration::from_millis(1_500)).await;
    harness.mixers.install(PRIMARY_PORT, FakeMixer::tournament());

    attempt.await.unwrap().unwrap();
    assert_eq!(harness.mixers.attempts(PRIMARY_PORT), 3);
}

#[tokio::test(start_paused = true)]
async fn startup_is_cancellable() {
    let mut config = test_config();
    config.retry.startup_max_attempts = 0;
    let harness = Harness::new(config);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        trigger.cancel();
    });

    let err = startup::connect_backends(&harness.state, &cancel)
        .await
        .err()
        .unwrap();
    assert_eq!(err, StartupError::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn supervisor_reconnects_after_the_transport_closes() {
    let harness = Harness::new(test_config());
    let first = FakeMixer::tournament();
    harness.attach(PRIMARY, first.clone()).await;
    let session = harness.state.connections().mixer(PRIMARY);

    let cancel = CancellationToken::new();
    let supervisor = tokio::spawn(supervise_mixer(
        harness.state.clone(),
        PRIMARY,
        session,
        cancel.clone(),
    ));

    let second = FakeMixer::tournament();
    harness.mixers.install(PRIMARY_PORT, second.clone());
    first.disconnect();
    advance(Duration::from_millis(100)).await;

    let current = harness.state.connections().mixer(PRIMARY).unwrap();
    let expected: Arc<dyn obs_match_director::backend::VideoMixer> = second;
    assert!(Arc::ptr_eq(&current, &expected));
    assert_eq!(harness.mixers.attempts(PRIMARY_PORT), 2);

    cancel.cancel();
    supervisor.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn supervisor_keeps_retrying_a_missing_mixer_until_cancelled() {
    let harness = Harness::new(test_config());
    let cancel = CancellationToken::new();
    let supervisor = tokio::spawn(supervise_mixer(
        harness.state.clone(),
        SECONDARY,
        None,
        cancel.clone(),
    ));

    advance(Duration::from_millis(20_500)).await;
    assert_eq!(harness.mixers.attempts(SECONDARY_PORT), 21);

    cancel.cancel();
    tokio::time::timeout(Duration::from_millis(10), supervisor)
        .await
        .expect("supervisor stops promptly")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn health_reports_degraded_until_mandatory_backends_connect() {
    let harness = Harness::new(test_config());

    let health = health_service::health_status(&harness.state);
    assert_eq!(health.status, "degraded");
    assert_eq!(health.backends.len(), 3);

    harness.attach(PRIMARY, FakeMixer::tournament()).await;
    harness.telemetry.push(FeedScript::open(&[]));
    let _feed = harness.state.connections().connect_telemetry().await.unwrap();

    let health = health_service::health_status(&harness.state);
    assert_eq!(health.status, "ok");
    let body = serde_json::to_value(&health).unwrap();
    assert_eq!(body["backends"][0]["role"], "video-mixer-primary");
    assert_eq!(body["backends"][0]["state"], "connected");
    assert_eq!(body["backends"][1]["state"], "disconnected");
    assert_eq!(body["pending_hides"], 0);
}
