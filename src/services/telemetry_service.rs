use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    backend::{BackendRole, TelemetryFeed},
    dto::telemetry::TelemetryEvent,
    services::{connection_supervisor::connect_telemetry_with_retry, playback_service},
    state::SharedState,
};

/// Why [`listen`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerEnded {
    /// The feed ended or failed; the session must be re-established.
    Disconnected,
    /// Shutdown was requested.
    Cancelled,
}

/// Consume `feed` until it ends or `cancel` fires, translating events into playback.
///
/// Bad frames are logged and skipped; only the end of the feed stops the loop.
pub async fn listen(
    state: &SharedState,
    mut feed: TelemetryFeed,
    cancel: &CancellationToken,
) -> ListenerEnded {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ListenerEnded::Cancelled,
            frame = feed.next() => frame,
        };

        match frame {
            Some(Ok(raw)) => handle_frame(state, &raw).await,
            Some(Err(err)) => {
                warn!(error = %err, "telemetry feed failed");
                return ListenerEnded::Disconnected;
            }
            None => {
                info!("telemetry feed ended");
                return ListenerEnded::Disconnected;
            }
        }
    }
}

/// Decode one frame and run the playback it asks for.
pub async fn handle_frame(state: &SharedState, raw: &str) {
    match TelemetryEvent::from_json_str(raw) {
        Ok(TelemetryEvent::MatchEnded { winner }) => {
            if let Err(err) = playback_service::announce_winner(state, winner).await {
                warn!(side = winner.label(), error = %err, "victory playback failed");
            }
        }
        Ok(TelemetryEvent::GoalScored) => {
            info!("goal scored");
            playback_service::play_goal(state).await;
        }
        Ok(TelemetryEvent::Other(event)) => debug!(%event, "ignoring telemetry event"),
        Err(err) => warn!(error = %err, "skipping telemetry frame"),
    }
}

/// Listen on `feed`, reconnecting whenever it ends, until `cancel` fires.
///
/// A single loop owns the telemetry role, so at most one listener is ever running.
pub async fn run(state: SharedState, mut feed: TelemetryFeed, cancel: CancellationToken) {
    loop {
        match listen(&state, feed, &cancel).await {
            ListenerEnded::Cancelled => break,
            ListenerEnded::Disconnected => {
                state.connections().mark_disconnected(BackendRole::Telemetry);
                match connect_telemetry_with_retry(&state, None, &cancel).await {
                    Ok(next) => {
                        info!("telemetry listener restarted");
                        feed = next;
                    }
                    Err(err) => {
                        debug!(reason = %err, "telemetry reconnection stopped");
                        break;
                    }
                }
            }
        }
    }
    info!("telemetry listener stopped");
}
