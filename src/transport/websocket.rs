use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rtvi_client_types::media::{MediaDeviceId, MediaDeviceInfo, Tracks};
use rtvi_client_types::{RtviMessageInbound, RtviMessageOutbound, TransportState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;

use crate::client::consts::AUTHORIZATION_HEADER;
use crate::error::{Result, RtviError};
use crate::transport::{AuthBundle, Transport, TransportContext};

const DEFAULT_CAPACITY: usize = 1024;

/// Where and how to open the socket, as read from an auth bundle.
#[derive(Debug, Clone, PartialEq)]
struct Endpoint {
    url: String,
    token: Option<String>,
    expiry: Option<u64>,
}

#[derive(serde::Deserialize)]
struct BundleFields {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ws_url: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiry: Option<u64>,
}

fn is_ws_url(url: &str) -> bool {
    url.starts_with("ws://") || url.starts_with("wss://")
}

fn invalid_bundle(source: Option<crate::error::BoxError>) -> RtviError {
    RtviError::InvalidAuthBundle { source }
}

fn parse_auth_bundle(bundle: &AuthBundle) -> Result<Endpoint> {
    let data = bundle.data().trim();
    if is_ws_url(data) {
        return Ok(Endpoint {
            url: data.to_string(),
            token: None,
            expiry: None,
        });
    }

    let fields: BundleFields =
        serde_json::from_str(data).map_err(|e| invalid_bundle(Some(Box::new(e))))?;
    let url = fields
        .url
        .or(fields.ws_url)
        .filter(|url| is_ws_url(url))
        .ok_or_else(|| invalid_bundle(None))?;
    Ok(Endpoint {
        url,
        token: fields.token,
        expiry: fields.expiry,
    })
}

fn build_request(endpoint: &Endpoint) -> Result<Request> {
    let mut request = endpoint
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| invalid_bundle(Some(Box::new(e))))?;
    if let Some(token) = &endpoint.token {
        let value = format!("Bearer {}", token)
            .parse::<HeaderValue>()
            .map_err(|e| invalid_bundle(Some(Box::new(e))))?;
        request.headers_mut().insert(AUTHORIZATION_HEADER, value);
    }
    Ok(request)
}

struct Connection {
    id: u64,
    tx: mpsc::Sender<RtviMessageOutbound>,
    send_handle: JoinHandle<()>,
    recv_handle: JoinHandle<()>,
}

/// A message-only transport speaking RTVI over a WebSocket.
///
/// The auth bundle is either a `ws://`/`wss://` URL or a JSON object with a
/// `url` (or `ws_url`) and optionally a bearer `token` and an `expiry`.
/// Without an auth bundle the URL given to [`WebSocketTransport::with_url`]
/// is used. No media devices are available.
pub struct WebSocketTransport {
    capacity: usize,
    url: Option<String>,
    context: Mutex<Option<TransportContext>>,
    connection: Arc<Mutex<Option<Connection>>>,
    next_id: AtomicU64,
    expiry: Mutex<Option<u64>>,
    mic_enabled: AtomicBool,
    cam_enabled: AtomicBool,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            url: None,
            context: Mutex::new(None),
            connection: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
            expiry: Mutex::new(None),
            mic_enabled: AtomicBool::new(false),
            cam_enabled: AtomicBool::new(false),
        }
    }

    /// Socket URL used when the client connects without an auth bundle.
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    /// Size of the outbound queue.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    fn context(&self) -> Result<TransportContext> {
        lock(&self.context)
            .clone()
            .ok_or_else(|| RtviError::transport("transport is not attached to a client"))
    }

    fn endpoint(&self, auth_bundle: Option<AuthBundle>) -> Result<Endpoint> {
        match (auth_bundle, &self.url) {
            (Some(bundle), _) => parse_auth_bundle(&bundle),
            (None, Some(url)) => parse_auth_bundle(&AuthBundle::new(url.as_str())),
            (None, None) => Err(invalid_bundle(None)),
        }
    }

    fn close_connection(&self) {
        if let Some(connection) = lock(&self.connection).take() {
            connection.close();
        }
    }
}

impl Connection {
    fn is_open(&self) -> bool {
        !self.recv_handle.is_finished()
    }

    fn close(self) {
        // dropping the sender lets the writer flush and close the socket
        drop(self.tx);
        self.recv_handle.abort();
        drop(self.send_handle);
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn attach(&self, context: TransportContext) {
        *lock(&self.context) = Some(context);
    }

    async fn init_devices(&self) -> Result<()> {
        Ok(())
    }

    async fn release(&self) {
        self.close_connection();
        lock(&self.context).take();
    }

    async fn connect(&self, auth_bundle: Option<AuthBundle>) -> Result<()> {
        let context = self.context()?;
        {
            let mut slot = lock(&self.connection);
            if slot.as_ref().is_some_and(Connection::is_open) {
                return Err(RtviError::transport("already connected"));
            }
            // left behind by a socket the server closed
            if let Some(stale) = slot.take() {
                stale.close();
            }
        }

        let endpoint = self.endpoint(auth_bundle)?;
        let request = build_request(&endpoint)?;
        tracing::info!("connecting to {}", endpoint.url);
        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RtviError::Transport {
                message: format!("failed to connect to {}", endpoint.url),
                source: Some(Box::new(e)),
            })?;
        *lock(&self.expiry) = endpoint.expiry;

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<RtviMessageOutbound>(self.capacity);

        let send_handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize message: {}", e);
                    }
                }
            }
            if let Err(e) = write.close().await {
                tracing::debug!("failed to close socket: {}", e);
            }
        });

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let reader = context.clone();
        let slot = self.connection.clone();
        let recv_handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<RtviMessageInbound>(&text) {
                        Ok(message) => (reader.on_message)(message),
                        Err(e) => {
                            tracing::error!("failed to deserialize message: {}, text=> {:?}", e, text);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                }
            }
            let superseded = {
                let mut slot = lock(&slot);
                match slot.as_ref() {
                    Some(current) if current.id == id => {
                        slot.take();
                        false
                    }
                    Some(_) => true,
                    None => false,
                }
            };
            if !superseded && reader.state.set(TransportState::Disconnected) {
                reader.delegate.notify(|d| d.on_disconnected());
            }
        });

        let connection = Connection {
            id,
            tx,
            send_handle,
            recv_handle,
        };
        if let Err(current) = context
            .state
            .transition(|s| s == TransportState::Connecting, TransportState::Connected)
        {
            tracing::info!("session is {}, closing the new connection", current);
            connection.close();
            return Ok(());
        }
        *lock(&self.connection) = Some(connection);
        context.delegate.notify(|d| d.on_connected());
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.close_connection();
        if let Ok(context) = self.context() {
            if context.state.set(TransportState::Disconnected) {
                context.delegate.notify(|d| d.on_disconnected());
            }
        }
        Ok(())
    }

    fn get_all_mics(&self) -> Vec<MediaDeviceInfo> {
        Vec::new()
    }

    fn get_all_cams(&self) -> Vec<MediaDeviceInfo> {
        Vec::new()
    }

    async fn update_mic(&self, mic_id: MediaDeviceId) -> Result<()> {
        Err(RtviError::transport(format!("no microphone with id {}", mic_id.id())))
    }

    async fn update_cam(&self, cam_id: MediaDeviceId) -> Result<()> {
        Err(RtviError::transport(format!("no camera with id {}", cam_id.id())))
    }

    fn selected_mic(&self) -> Option<MediaDeviceInfo> {
        None
    }

    fn selected_cam(&self) -> Option<MediaDeviceInfo> {
        None
    }

    async fn enable_mic(&self, enable: bool) -> Result<()> {
        self.mic_enabled.store(enable, Ordering::SeqCst);
        Ok(())
    }

    async fn enable_cam(&self, enable: bool) -> Result<()> {
        self.cam_enabled.store(enable, Ordering::SeqCst);
        Ok(())
    }

    fn is_mic_enabled(&self) -> bool {
        self.mic_enabled.load(Ordering::SeqCst)
    }

    fn is_cam_enabled(&self) -> bool {
        self.cam_enabled.load(Ordering::SeqCst)
    }

    fn send_message(&self, message: &RtviMessageOutbound) -> Result<()> {
        let connection = lock(&self.connection);
        let Some(connection) = connection.as_ref().filter(|c| c.is_open()) else {
            return Err(RtviError::transport("not connected"));
        };
        connection
            .tx
            .try_send(message.clone())
            .map_err(|e| RtviError::Transport {
                message: format!("failed to queue message {}", message.id()),
                source: Some(Box::new(e)),
            })
    }

    fn state(&self) -> TransportState {
        self.context()
            .map(|context| context.state.get())
            .unwrap_or(TransportState::Disconnected)
    }

    fn set_state(&self, state: TransportState) {
        if let Ok(context) = self.context() {
            context.state.set(state);
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.connection).as_ref().is_some_and(Connection::is_open)
            && matches!(self.state(), TransportState::Connected | TransportState::Ready)
    }

    fn tracks(&self) -> Option<Tracks> {
        None
    }

    fn expiry(&self) -> Option<u64> {
        *lock(&self.expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegate::DelegateHandle;
    use crate::state::StateCell;
    use crate::testing::wait_for;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_bare_url() {
        let endpoint = parse_auth_bundle(&AuthBundle::new(" wss://bot.example.com/ws ")).unwrap();
        assert_eq!(endpoint.url, "wss://bot.example.com/ws");
        assert_eq!(endpoint.token, None);
    }

    #[test]
    fn test_parse_json_bundle() {
        let endpoint = parse_auth_bundle(&AuthBundle::new(
            r#"{"ws_url":"ws://localhost:7860/ws","token":"abc","expiry":1700000000}"#,
        ))
        .unwrap();
        assert_eq!(
            endpoint,
            Endpoint {
                url: "ws://localhost:7860/ws".to_string(),
                token: Some("abc".to_string()),
                expiry: Some(1_700_000_000),
            }
        );

        let request = build_request(&endpoint).unwrap();
        assert_eq!(request.headers()[AUTHORIZATION_HEADER], "Bearer abc");
    }

    #[test]
    fn test_invalid_bundles() {
        for data in [
            "https://bot.example.com",
            r#"{"room":"r1"}"#,
            r#"{"url":"http://bot.example.com"}"#,
            "not json",
        ] {
            assert!(
                matches!(
                    parse_auth_bundle(&AuthBundle::new(data)),
                    Err(RtviError::InvalidAuthBundle { .. })
                ),
                "{} should be rejected",
                data
            );
        }
    }

    fn attached(transport: &WebSocketTransport) -> (StateCell, Arc<Mutex<Vec<RtviMessageInbound>>>) {
        let state = StateCell::new(DelegateHandle::new());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        transport.attach(TransportContext {
            on_message: Arc::new(move |message| sink.lock().unwrap().push(message)),
            state: state.clone(),
            delegate: DelegateHandle::new(),
        });
        (state, received)
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let transport = WebSocketTransport::new();
        attached(&transport);
        let result = transport.send_message(&RtviMessageOutbound::client_ready());
        assert!(matches!(result, Err(RtviError::Transport { .. })));
        assert!(matches!(
            transport.connect(None).await,
            Err(RtviError::InvalidAuthBundle { .. })
        ));
    }

    #[tokio::test]
    async fn test_exchanges_messages_until_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let first = ws.next().await.unwrap().unwrap();
            ws.send(Message::Text(
                r#"{"id":"1","label":"rtvi-ai","type":"bot-ready","data":{"version":"0.2.0"}}"#
                    .to_string(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
            first.into_text().unwrap()
        });

        let transport = WebSocketTransport::new().with_url(&url);
        let (state, received) = attached(&transport);
        state.set(TransportState::Authenticating);
        state.set(TransportState::Connecting);

        transport.connect(None).await.unwrap();
        assert!(transport.is_connected());
        transport
            .send_message(&RtviMessageOutbound::client_ready())
            .unwrap();

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["type"], "client-ready");

        wait_for(|| state.get() == TransportState::Disconnected).await;
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message_type(), Some("bot-ready"));
    }

    #[tokio::test]
    async fn test_reconnects_after_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.close(None).await.unwrap();
            while ws.next().await.is_some() {}

            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.next().await.unwrap().unwrap().into_text().unwrap()
        });

        let transport = WebSocketTransport::new().with_url(&url);
        let (state, _) = attached(&transport);
        state.set(TransportState::Authenticating);
        state.set(TransportState::Connecting);
        transport.connect(None).await.unwrap();
        wait_for(|| state.get() == TransportState::Disconnected).await;
        assert!(!transport.is_connected());

        state.set(TransportState::Authenticating);
        state.set(TransportState::Connecting);
        transport.connect(None).await.unwrap();
        assert_eq!(state.get(), TransportState::Connected);
        transport
            .send_message(&RtviMessageOutbound::client_ready())
            .unwrap();

        let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["type"], "client-ready");
    }

    #[tokio::test]
    async fn test_connection_finishing_after_teardown_is_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let mut frames = 0;
            while let Some(Ok(message)) = ws.next().await {
                if message.is_close() {
                    break;
                }
                frames += 1;
            }
            frames
        });

        let transport = WebSocketTransport::new().with_url(&url);
        let (state, _) = attached(&transport);

        transport.connect(None).await.unwrap();
        assert_eq!(state.get(), TransportState::Disconnected);
        assert!(!transport.is_connected());
        assert!(transport
            .send_message(&RtviMessageOutbound::client_ready())
            .is_err());
        assert_eq!(server.await.unwrap(), 0);
    }
}
