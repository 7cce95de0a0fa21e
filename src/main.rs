//! obs-match-director binary entrypoint wiring the video mixers, the telemetry feed and the command channel.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obs_match_director::{
    backend::{obs::ObsConnector, sos::SosConnector},
    config::AppConfig,
    routes,
    services::{
        startup::{self, StartupError},
        telemetry_service,
    },
    state::{AppState, SharedState},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config, Arc::new(ObsConnector), Arc::new(SosConnector));
    let cancel = app_state.shutdown().clone();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            info!("shutdown requested");
            cancel.cancel();
        }
    });

    let server = if app_state.config().command_channel.enabled {
        Some(tokio::spawn(serve_commands(
            app_state.clone(),
            bind_command_channel(&app_state).await?,
        )))
    } else {
        info!("command channel disabled");
        None
    };

    let backends = match startup::connect_backends(&app_state, &cancel).await {
        Ok(backends) => Some(backends),
        Err(StartupError::Cancelled) => None,
        Err(err) => {
            cancel.cancel();
            return Err(err).context("connecting backends");
        }
    };

    if let Some(backends) = backends {
        let supervisors = startup::spawn_mixer_supervisors(&app_state, backends.mixers, &cancel);
        info!("director ready");
        telemetry_service::run(app_state.clone(), backends.telemetry, cancel.clone()).await;
        for supervisor in supervisors {
            let _ = supervisor.await;
        }
    }

    let dropped = app_state.hide_timers().cancel_all();
    if dropped > 0 {
        info!(dropped, "dropped pending hides on shutdown");
    }
    app_state.connections().disconnect_all();

    if let Some(server) = server {
        match server.await {
            Ok(result) => result?,
            Err(err) => warn!(error = %err, "command channel task failed"),
        }
    }

    Ok(())
}

async fn bind_command_channel(state: &SharedState) -> anyhow::Result<TcpListener> {
    let channel = &state.config().command_channel;
    let addr = format!("{}:{}", channel.host, channel.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding command channel on {addr}"))?;
    info!(%addr, "command channel listening");
    Ok(listener)
}

/// Serve the command channel and health routes until shutdown.
async fn serve_commands(state: SharedState, listener: TcpListener) -> anyhow::Result<()> {
    let shutdown = state.shutdown().clone();
    let service = routes::router(state).into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("serving command channel")?;
    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
