use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::command::{Command, CommandOutcome, CommandResponse},
    error::AppError,
    services::playback_service,
    state::SharedState,
};

/// Serve one command-channel client until it disconnects or the process shuts down.
///
/// Messages are answered in order, one response each; other clients are served
/// by their own task.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps pongs flowing while a command is still running.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let client_id = Uuid::new_v4();
    info!(%client_id, "command client connected");

    loop {
        let message = tokio::select! {
            _ = state.shutdown().cancelled() => {
                let _ = outbound_tx.send(Message::Close(None));
                break;
            }
            message = receiver.next() => message,
        };
        let Some(message) = message else {
            break;
        };

        let payload = match message {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
                continue;
            }
            Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Err(err) => {
                warn!(%client_id, error = %err, "websocket error");
                break;
            }
        };

        debug!(%client_id, %payload, "received command");
        let response = respond(&state, &payload).await;
        if send_response(&outbound_tx, &response).is_err() {
            break;
        }
    }

    info!(%client_id, "command client disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Decode, execute and answer one raw message. Never fails: errors become error responses.
pub async fn respond(state: &SharedState, raw: &str) -> CommandResponse {
    let command = match Command::from_json_str(raw) {
        Ok(command) => command,
        Err(err) => {
            warn!(error = %err, "rejected command");
            return err.into();
        }
    };

    info!(command = command.name(), "executing command");
    match execute(state, command).await {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "command failed");
            err.into()
        }
    }
}

/// Run a decoded command against the scheduler or the match registry.
pub async fn execute(state: &SharedState, command: Command) -> Result<CommandResponse, AppError> {
    let outcome = match &command {
        Command::PlayMatchup => {
            let video = playback_service::play_matchup(state).await?;
            CommandOutcome::Started {
                message: "Matchup video started".to_string(),
                video,
            }
        }
        Command::HideMatchup => {
            let hidden = playback_service::hide_matchup(state).await?;
            CommandOutcome::Hidden {
                message: "Matchup video hidden on all video mixers".to_string(),
                hidden,
            }
        }
        Command::PlayVideo { team, color } => CommandOutcome::Video {
            video: playback_service::play_video(state, team, *color).await?,
        },
        Command::PlayAudio => {
            playback_service::play_audio(state).await?;
            CommandOutcome::Message {
                message: "Audio started".to_string(),
            }
        }
        Command::TriggerWin { side } => {
            let win = playback_service::announce_winner(state, *side).await?;
            CommandOutcome::Win {
                team: win.side.label(),
                team_name: win.team_name,
                video: win.video,
            }
        }
        Command::SetMatch { match_index } => {
            let entry = state.matches().write().await.set_current(*match_index)?;
            info!(
                match_number = entry.number(),
                blue = %entry.pairing.blue_team,
                orange = %entry.pairing.orange_team,
                "current match changed"
            );
            CommandOutcome::Match(entry.into())
        }
        Command::GetCurrentMatch => {
            CommandOutcome::Match(state.matches().read().await.current()?.into())
        }
        Command::ListMatches => {
            let registry = state.matches().read().await;
            CommandOutcome::Matches {
                matches: registry.entries().into_iter().map(Into::into).collect(),
                current_match_index: registry.current_index(),
            }
        }
    };

    Ok(CommandResponse::success(&command, outcome))
}

/// Serialize a response and queue it on the writer.
///
/// Returns `Err(())` once the writer is gone; serialization failures are logged and skipped.
fn send_response(tx: &mpsc::UnboundedSender<Message>, response: &CommandResponse) -> Result<(), ()> {
    let payload = match serde_json::to_string(response) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize response `{response:?}`");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into())).map_err(|_| ())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
