use std::sync::Arc;

use futures::{StreamExt, stream::FuturesUnordered};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    backend::{BackendRole, TelemetryFeed, VideoMixer},
    services::connection_supervisor::{
        RetryError, connect_mixer_with_retry, connect_telemetry_with_retry, supervise_mixer,
    },
    state::SharedState,
};

/// Conditions that stop the process before playback can start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartupError {
    /// Neither video mixer could be reached.
    #[error("no video mixer reachable")]
    NoVideoMixer,
    /// The telemetry source could not be reached.
    #[error("telemetry source unreachable")]
    TelemetryUnavailable,
    /// Shutdown was requested while connecting.
    #[error("startup cancelled")]
    Cancelled,
}

/// Sessions opened during startup.
pub struct ConnectedBackends {
    /// Telemetry feed to hand to the listener.
    pub telemetry: TelemetryFeed,
    /// Every configured mixer role with its session, `None` if it is still unreachable.
    pub mixers: Vec<(BackendRole, Option<Arc<dyn VideoMixer>>)>,
}

/// Connect all configured roles concurrently using the startup attempt cap.
///
/// Returns as soon as telemetry and one video mixer are connected. A mixer
/// role still retrying at that point is reported as `None` and left to its
/// supervisor. Fails when telemetry or every video mixer exhausts its attempts.
pub async fn connect_backends(
    state: &SharedState,
    cancel: &CancellationToken,
) -> Result<ConnectedBackends, StartupError> {
    let limit = state.config().retry.startup_limit();
    let roles = state.connections().configured_mixers();
    info!(
        mixers = roles.len(),
        max_attempts = limit.unwrap_or(0),
        "connecting backends"
    );

    let mut pending: FuturesUnordered<_> = roles
        .iter()
        .map(|role| async move {
            (*role, connect_mixer_with_retry(state, *role, limit, cancel).await)
        })
        .collect();
    let telemetry = connect_telemetry_with_retry(state, limit, cancel);
    tokio::pin!(telemetry);

    let mut feed: Option<TelemetryFeed> = None;
    let mut connected: Vec<(BackendRole, Arc<dyn VideoMixer>)> = Vec::new();

    while feed.is_none() || connected.is_empty() {
        tokio::select! {
            biased;
            Some((role, result)) = pending.next(), if connected.is_empty() => {
                match result {
                    Ok(mixer) => connected.push((role, mixer)),
                    Err(RetryError::Cancelled) => return Err(StartupError::Cancelled),
                    Err(err) => warn!(%role, reason = %err, "video mixer unavailable at startup"),
                }
                if connected.is_empty() && pending.is_empty() {
                    error!("no video mixer could be reached");
                    return Err(StartupError::NoVideoMixer);
                }
            }
            result = &mut telemetry, if feed.is_none() => match result {
                Ok(telemetry) => feed = Some(telemetry),
                Err(RetryError::Cancelled) => return Err(StartupError::Cancelled),
                Err(RetryError::Exhausted { attempts }) => {
                    error!(attempts, "telemetry source could not be reached");
                    return Err(StartupError::TelemetryUnavailable);
                }
            },
            else => break,
        }
    }
    // Roles still retrying are handed over to their supervisors.
    drop(pending);

    if cancel.is_cancelled() {
        return Err(StartupError::Cancelled);
    }
    let telemetry = feed.ok_or(StartupError::TelemetryUnavailable)?;
    if connected.is_empty() {
        return Err(StartupError::NoVideoMixer);
    }

    let mixers: Vec<_> = roles
        .into_iter()
        .map(|role| {
            let session = connected
                .iter()
                .find(|(connected_role, _)| *connected_role == role)
                .map(|(_, mixer)| Arc::clone(mixer));
            if session.is_none() {
                info!(%role, "continuing without video mixer; retrying in the background");
            }
            (role, session)
        })
        .collect();

    Ok(ConnectedBackends { telemetry, mixers })
}

/// Spawn one supervisor per configured mixer role.
pub fn spawn_mixer_supervisors(
    state: &SharedState,
    mixers: Vec<(BackendRole, Option<Arc<dyn VideoMixer>>)>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    mixers
        .into_iter()
        .map(|(role, session)| {
            tokio::spawn(supervise_mixer(
                state.clone(),
                role,
                session,
                cancel.clone(),
            ))
        })
        .collect()
}
