//! SOS WebSocket telemetry session.

use std::time::Duration;

use futures::{StreamExt, future::BoxFuture};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info};

use crate::{
    backend::{TelemetryConnector, TelemetryError, TelemetryFeed},
    config::EndpointConfig,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens SOS telemetry feeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SosConnector;

impl TelemetryConnector for SosConnector {
    fn connect(
        &self,
        endpoint: &EndpointConfig,
    ) -> BoxFuture<'static, Result<TelemetryFeed, TelemetryError>> {
        let url = endpoint.url();
        Box::pin(async move {
            let (mut stream, _response) = timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
                .await
                .map_err(|_| TelemetryError::Connect(format!("timed out connecting to {url}")))?
                .map_err(|err| TelemetryError::Connect(err.to_string()))?;
            info!(%url, "telemetry session open");

            let feed = async_stream::stream! {
                while let Some(message) = stream.next().await {
                    match message {
                        Ok(Message::Text(text)) => yield Ok(text.to_string()),
                        Ok(Message::Close(frame)) => {
                            debug!(?frame, "telemetry source closed the session");
                            break;
                        }
                        Ok(_) => continue,
                        Err(err) => {
                            yield Err(TelemetryError::Transport(err.to_string()));
                            break;
                        }
                    }
                }
            };
            Ok(feed.boxed())
        })
    }
}
