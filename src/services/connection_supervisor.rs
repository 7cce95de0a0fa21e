use std::{future::Future, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    backend::{BackendRole, TelemetryFeed, VideoMixer},
    state::{ConnectionError, SharedState},
};

/// Why a retry loop stopped without a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError {
    /// The caller cancelled the loop.
    #[error("connection attempts cancelled")]
    Cancelled,
    /// The attempt cap was reached.
    #[error("gave up after {attempts} connection attempts")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

/// Repeat `connect` with a fixed delay until it succeeds, `max_attempts` is
/// reached (`None` retries forever), or `cancel` fires.
///
/// Cancellation interrupts both an in-flight attempt and the delay.
pub async fn connect_with_retry<T, F, Fut>(
    role: BackendRole,
    delay: Duration,
    max_attempts: Option<u32>,
    cancel: &CancellationToken,
    mut connect: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ConnectionError>>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            outcome = connect() => outcome,
        };

        match outcome {
            Ok(session) => {
                if attempt > 1 {
                    info!(%role, attempt, "connection established after retrying");
                }
                return Ok(session);
            }
            Err(err) => {
                warn!(%role, attempt, error = %err, "connection attempt failed");
            }
        }

        if max_attempts.is_some_and(|max| attempt >= max) {
            warn!(%role, attempts = attempt, "exhausted connection attempts");
            return Err(RetryError::Exhausted { attempts: attempt });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = sleep(delay) => {}
        }
    }
}

/// [`connect_with_retry`] for a video-mixer role, using the configured delay.
pub async fn connect_mixer_with_retry(
    state: &SharedState,
    role: BackendRole,
    max_attempts: Option<u32>,
    cancel: &CancellationToken,
) -> Result<Arc<dyn VideoMixer>, RetryError> {
    let delay = state.config().retry.delay();
    connect_with_retry(role, delay, max_attempts, cancel, || {
        state.connections().connect_mixer(role)
    })
    .await
}

/// [`connect_with_retry`] for the telemetry role, using the configured delay.
pub async fn connect_telemetry_with_retry(
    state: &SharedState,
    max_attempts: Option<u32>,
    cancel: &CancellationToken,
) -> Result<TelemetryFeed, RetryError> {
    let delay = state.config().retry.delay();
    connect_with_retry(BackendRole::Telemetry, delay, max_attempts, cancel, || {
        state.connections().connect_telemetry()
    })
    .await
}

/// Keep a video-mixer role connected until `cancel` fires.
///
/// Starts from `session` when startup already connected the role; otherwise
/// reconnects straight away. Every time the transport closes the role is marked
/// `disconnected` and reconnection runs again without an attempt cap.
pub async fn supervise_mixer(
    state: SharedState,
    role: BackendRole,
    mut session: Option<Arc<dyn VideoMixer>>,
    cancel: CancellationToken,
) {
    loop {
        if let Some(mixer) = session.take() {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = mixer.closed() => {}
            }
            state.connections().mark_disconnected(role);
        }

        match connect_mixer_with_retry(&state, role, None, &cancel).await {
            Ok(mixer) => session = Some(mixer),
            Err(err) => {
                info!(%role, reason = %err, "mixer supervisor stopped");
                return;
            }
        }
    }
}
