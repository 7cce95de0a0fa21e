//! OBS WebSocket (protocol v5) video-mixer session.

use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use dashmap::DashMap;
use futures::{Sink, SinkExt, StreamExt, future::BoxFuture};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
    time::timeout,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    backend::{MixerConnector, MixerError, MixerResult, SceneItem, VideoMixer},
    config::EndpointConfig,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const RPC_VERSION: u32 = 1;

const OP_HELLO: u8 = 0;
const OP_IDENTIFY: u8 = 1;
const OP_IDENTIFIED: u8 = 2;
const OP_REQUEST: u8 = 6;
const OP_REQUEST_RESPONSE: u8 = 7;

const STATUS_RESOURCE_NOT_FOUND: u16 = 600;
const MEDIA_ACTION_RESTART: &str = "OBS_WEBSOCKET_MEDIA_INPUT_ACTION_RESTART";

type ObsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
struct Frame {
    op: u8,
    #[serde(default)]
    d: Value,
}

#[derive(Debug, Serialize)]
struct OutboundFrame<'a, T> {
    op: u8,
    d: &'a T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Hello {
    #[serde(default)]
    authentication: Option<AuthChallenge>,
    #[serde(default = "default_rpc_version")]
    rpc_version: u32,
}

#[derive(Debug, Deserialize)]
struct AuthChallenge {
    challenge: String,
    salt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Identify {
    rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    authentication: Option<String>,
    event_subscriptions: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    request_type: &'a str,
    request_id: &'a str,
    request_data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestResponse {
    request_id: String,
    request_status: RequestStatus,
    #[serde(default)]
    response_data: Value,
}

#[derive(Debug, Deserialize)]
struct RequestStatus {
    result: bool,
    code: u16,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneItemList {
    scene_items: Vec<RawSceneItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSceneItem {
    scene_item_id: i64,
    source_name: String,
}

fn default_rpc_version() -> u32 {
    RPC_VERSION
}

/// Opens [`ObsClient`] sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObsConnector;

impl MixerConnector for ObsConnector {
    fn connect(
        &self,
        endpoint: &EndpointConfig,
    ) -> BoxFuture<'static, MixerResult<Arc<dyn VideoMixer>>> {
        let url = endpoint.url();
        let password = endpoint.password().map(str::to_owned);
        Box::pin(async move {
            let client = timeout(CONNECT_TIMEOUT, ObsClient::connect(&url, password.as_deref()))
                .await
                .map_err(|_| MixerError::Handshake(format!("timed out connecting to {url}")))??;
            Ok(Arc::new(client) as Arc<dyn VideoMixer>)
        })
    }
}

/// Identified session with one OBS instance.
pub struct ObsClient {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    outbound: mpsc::UnboundedSender<Message>,
    pending: DashMap<String, oneshot::Sender<RequestResponse>>,
    closed: watch::Sender<bool>,
}

impl ObsClient {
    /// Connect, authenticate and identify against `url`.
    pub async fn connect(url: &str, password: Option<&str>) -> MixerResult<Self> {
        let (mut stream, _response) = connect_async(url)
            .await
            .map_err(|err| MixerError::Handshake(err.to_string()))?;
        identify(&mut stream, password).await?;

        let (sink, mut source) = stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel::<Message>();
        let inner = Inner::new(url, outbound);

        // Dedicated writer task so requests never wait on the reader.
        tokio::spawn(write_frames(sink, outbound_rx, Arc::downgrade(&inner)));

        let reader = Arc::clone(&inner);
        tokio::spawn(async move {
            while let Some(message) = source.next().await {
                match message {
                    Ok(Message::Text(text)) => reader.dispatch(text.as_str()),
                    Ok(Message::Close(frame)) => {
                        debug!(url = %reader.url, ?frame, "video mixer closed the session");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(url = %reader.url, error = %err, "video mixer transport error");
                        break;
                    }
                }
            }
            reader.mark_closed();
        });

        info!(%url, "video mixer session identified");
        Ok(Self { inner })
    }
}

impl Drop for ObsClient {
    fn drop(&mut self) {
        let _ = self.inner.outbound.send(Message::Close(None));
    }
}

impl Inner {
    fn new(url: &str, outbound: mpsc::UnboundedSender<Message>) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            url: url.to_string(),
            outbound,
            pending: DashMap::new(),
            closed,
        })
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Flag the session as dead. Either half of the transport may call this.
    fn mark_closed(&self) {
        self.closed.send_replace(true);
        // Dropping the senders fails every in-flight request with `Disconnected`.
        self.pending.clear();
    }

    async fn call(&self, request_type: &str, request_data: Value) -> MixerResult<Value> {
        if self.is_closed() {
            return Err(MixerError::Disconnected);
        }

        let request_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.clone(), tx);
        if self.is_closed() {
            self.pending.remove(&request_id);
            return Err(MixerError::Disconnected);
        }

        let payload = serde_json::to_string(&OutboundFrame {
            op: OP_REQUEST,
            d: &Request {
                request_type,
                request_id: &request_id,
                request_data,
            },
        })
        .map_err(|err| MixerError::Protocol(err.to_string()))?;

        if self.outbound.send(Message::Text(payload.into())).is_err() {
            self.pending.remove(&request_id);
            return Err(MixerError::Disconnected);
        }

        let response = match timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(MixerError::Disconnected),
            Err(_) => {
                self.pending.remove(&request_id);
                return Err(MixerError::Timeout(request_type.to_string()));
            }
        };

        let status = response.request_status;
        if status.result {
            Ok(response.response_data)
        } else {
            Err(MixerError::Request {
                request_type: request_type.to_string(),
                code: status.code,
                comment: status.comment.unwrap_or_default(),
            })
        }
    }

    /// Route a response frame to the request awaiting it. Events are ignored.
    fn dispatch(&self, raw: &str) {
        let frame = match serde_json::from_str::<Frame>(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(url = %self.url, error = %err, "ignoring undecodable video mixer frame");
                return;
            }
        };
        if frame.op != OP_REQUEST_RESPONSE {
            return;
        }
        match serde_json::from_value::<RequestResponse>(frame.d) {
            Ok(response) => {
                if let Some((_, waiter)) = self.pending.remove(&response.request_id) {
                    let _ = waiter.send(response);
                }
            }
            Err(err) => warn!(url = %self.url, error = %err, "malformed video mixer response"),
        }
    }
}

impl VideoMixer for ObsClient {
    fn scene_items(&self, scene: &str) -> BoxFuture<'static, MixerResult<Vec<SceneItem>>> {
        let inner = Arc::clone(&self.inner);
        let scene = scene.to_string();
        Box::pin(async move {
            let data = inner
                .call("GetSceneItemList", json!({ "sceneName": scene }))
                .await
                .map_err(|err| match err {
                    MixerError::Request { code, .. } if code == STATUS_RESOURCE_NOT_FOUND => {
                        MixerError::SceneNotFound(scene.clone())
                    }
                    other => other,
                })?;
            let list: SceneItemList = serde_json::from_value(data)
                .map_err(|err| MixerError::Protocol(err.to_string()))?;
            Ok(list
                .scene_items
                .into_iter()
                .map(|item| SceneItem {
                    id: item.scene_item_id,
                    source_name: item.source_name,
                })
                .collect())
        })
    }

    fn set_item_visible(
        &self,
        scene: &str,
        item_id: i64,
        visible: bool,
    ) -> BoxFuture<'static, MixerResult<()>> {
        let inner = Arc::clone(&self.inner);
        let data = json!({
            "sceneName": scene,
            "sceneItemId": item_id,
            "sceneItemEnabled": visible,
        });
        Box::pin(async move { inner.call("SetSceneItemEnabled", data).await.map(|_| ()) })
    }

    fn restart_media(&self, source: &str) -> BoxFuture<'static, MixerResult<()>> {
        let inner = Arc::clone(&self.inner);
        let data = json!({
            "inputName": source,
            "mediaAction": MEDIA_ACTION_RESTART,
        });
        Box::pin(async move {
            inner
                .call("TriggerMediaInputAction", data)
                .await
                .map(|_| ())
        })
    }

    fn is_connected(&self) -> bool {
        !self.inner.is_closed()
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        let mut closed = self.inner.closed.subscribe();
        Box::pin(async move {
            let _ = closed.wait_for(|closed| *closed).await;
        })
    }
}

/// Forward queued frames to the mixer until the session closes.
///
/// A failed send closes the session right away instead of leaving callers to
/// run into request timeouts.
async fn write_frames<S>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    session: Weak<Inner>,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(err) = sink.send(message).await {
            if let Some(session) = session.upgrade() {
                warn!(url = %session.url, error = %err, "video mixer write failed");
                session.mark_closed();
            }
            break;
        }
        if closing {
            break;
        }
    }
}

/// Run the Hello / Identify / Identified exchange.
async fn identify(stream: &mut ObsStream, password: Option<&str>) -> MixerResult<()> {
    let hello: Hello = expect_frame(stream, OP_HELLO).await?;
    let authentication = match (hello.authentication, password) {
        (Some(challenge), Some(password)) => Some(authentication_response(
            password,
            &challenge.salt,
            &challenge.challenge,
        )),
        (Some(_), None) => return Err(MixerError::AuthenticationRequired),
        (None, _) => None,
    };

    let identify = Identify {
        rpc_version: hello.rpc_version.min(RPC_VERSION),
        authentication,
        event_subscriptions: 0,
    };
    let payload = serde_json::to_string(&OutboundFrame {
        op: OP_IDENTIFY,
        d: &identify,
    })
    .map_err(|err| MixerError::Protocol(err.to_string()))?;
    stream
        .send(Message::Text(payload.into()))
        .await
        .map_err(|err| MixerError::Handshake(err.to_string()))?;

    let _: Value = expect_frame(stream, OP_IDENTIFIED).await?;
    Ok(())
}

async fn expect_frame<T: DeserializeOwned>(stream: &mut ObsStream, op: u8) -> MixerResult<T> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame: Frame = serde_json::from_str(text.as_str())
                    .map_err(|err| MixerError::Protocol(err.to_string()))?;
                if frame.op != op {
                    return Err(MixerError::Protocol(format!(
                        "expected op {op}, received op {}",
                        frame.op
                    )));
                }
                return serde_json::from_value(frame.d)
                    .map_err(|err| MixerError::Protocol(err.to_string()));
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame
                    .map(|frame| {
                        format!(
                            "closed with code {}: {}",
                            u16::from(frame.code),
                            frame.reason.as_str()
                        )
                    })
                    .unwrap_or_else(|| "connection closed".into());
                return Err(MixerError::Handshake(reason));
            }
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Err(MixerError::Handshake(err.to_string())),
            None => return Err(MixerError::Handshake("connection closed".into())),
        }
    }
}

/// `base64(sha256(base64(sha256(password + salt)) + challenge))`
fn authentication_response(password: &str, salt: &str, challenge: &str) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{password}{salt}").as_bytes()));
    STANDARD.encode(Sha256::digest(format!("{secret}{challenge}").as_bytes()))
}
