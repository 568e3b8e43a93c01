use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use rtvi_client_types::media::{MediaDeviceId, MediaDeviceInfo, Tracks};
use rtvi_client_types::{
    ActionRequest, ActionResponse, ActionResponseWrapper, BotError, BotLlmText, BotReadyData, BotTtsText,
    ConfigResponse, DescribeActionResponse, DescribeConfigResponse, ErrorResponse, InboundMessageType,
    RtviMessageInbound, RtviMessageOutbound, ServiceConfig, StorageItemStoredData, Transcript,
    TransportState, Value,
};
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::delegate::{DelegateHandle, RtviClientDelegate};
use crate::dispatcher::MessageDispatcher;
use crate::error::{Result, RtviError};
use crate::helper::{HelperRegistry, RtviClientHelper};
use crate::http::{self, HttpMessageDispatcher};
use crate::state::StateCell;
use crate::transport::{MessageHandler, Transport, TransportContext};

mod config;
pub(crate) mod consts;
pub(crate) mod utils;

pub use config::{ConfigError, Endpoints, RtviClientOptions, RtviClientOptionsBuilder};

struct ClientInner {
    options: RtviClientOptions,
    transport: Arc<dyn Transport>,
    dispatcher: MessageDispatcher,
    http_client: reqwest::Client,
    // custom body params with the version marker already merged in
    request_data: Value,
    state: StateCell,
    delegate: DelegateHandle,
    helpers: Mutex<HelperRegistry>,
    devices_initialized: AtomicBool,
    disconnect_requested: AtomicBool,
}

/// Drives one RTVI session with a bot.
///
/// The client owns the transport, performs the authentication handshake,
/// routes every inbound message and exposes the request/response operations
/// of the protocol. Handles are cheap to clone and share one session.
#[derive(Clone)]
pub struct RtviClient {
    inner: Arc<ClientInner>,
}

/// A non-owning handle to an [`RtviClient`], as held by helpers.
#[derive(Clone, Default)]
pub struct WeakRtviClient {
    inner: Weak<ClientInner>,
}

impl WeakRtviClient {
    /// A handle that never upgrades.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upgrade(&self) -> Option<RtviClient> {
        self.inner.upgrade().map(|inner| RtviClient { inner })
    }
}

fn decode<T: DeserializeOwned>(message: &RtviMessageInbound) -> Option<T> {
    match message.decode_data() {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::error!(
                "failed to decode {} payload: {}",
                message.message_type().unwrap_or("unknown"),
                e
            );
            None
        }
    }
}

impl RtviClient {
    /// Creates a client driving `transport`.
    ///
    /// Must be called from within a Tokio runtime, the client runs a
    /// background task that expires unanswered requests.
    pub fn new(transport: Arc<dyn Transport>, options: RtviClientOptions) -> Self {
        tracing::info!("initializing RTVI client version {}", consts::LIBRARY_VERSION);

        let inner = Arc::new_cyclic(|weak: &Weak<ClientInner>| {
            let on_message: MessageHandler = {
                let weak = weak.clone();
                Arc::new(move |message| {
                    if let Some(inner) = weak.upgrade() {
                        RtviClient { inner }.on_message(message);
                    }
                })
            };

            let delegate = DelegateHandle::new();
            let state = StateCell::new(delegate.clone());
            let http_client = reqwest::Client::new();
            let request_data = utils::with_client_version(options.request_data());

            let http = options.base_url().map(|base_url| {
                Arc::new(HttpMessageDispatcher::new(
                    http_client.clone(),
                    base_url,
                    &options,
                    request_data.clone(),
                    on_message.clone(),
                ))
            });
            let dispatcher = MessageDispatcher::new(
                transport.clone(),
                http,
                options.response_timeout(),
                options.gc_interval(),
            );

            transport.attach(TransportContext {
                on_message,
                state: state.clone(),
                delegate: delegate.clone(),
            });

            ClientInner {
                options,
                transport,
                dispatcher,
                http_client,
                request_data,
                state,
                delegate,
                helpers: Mutex::new(HelperRegistry::new()),
                devices_initialized: AtomicBool::new(false),
                disconnect_requested: AtomicBool::new(false),
            }
        });

        Self { inner }
    }

    pub fn downgrade(&self) -> WeakRtviClient {
        WeakRtviClient {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Sets the delegate. The client only keeps a weak reference to it.
    pub fn set_delegate(&self, delegate: Option<&Arc<dyn RtviClientDelegate>>) {
        self.inner.delegate.set(delegate);
    }

    pub fn delegate(&self) -> Option<Arc<dyn RtviClientDelegate>> {
        self.inner.delegate.get()
    }

    pub fn options(&self) -> &RtviClientOptions {
        &self.inner.options
    }

    pub fn state(&self) -> TransportState {
        self.inner.state.get()
    }

    /// A receiver observing every session state change.
    pub fn subscribe_state(&self) -> watch::Receiver<TransportState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.transport.is_connected()
    }

    // --- lifecycle

    /// Initializes local media devices. Only the first successful call does anything.
    pub async fn init_devices(&self) -> Result<()> {
        if self.inner.devices_initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(current) = self.inner.state.transition(
            |s| s == TransportState::Disconnected,
            TransportState::Initializing,
        ) {
            tracing::debug!("initializing devices while {}", current);
        }
        self.initialize_devices().await
    }

    async fn initialize_devices(&self) -> Result<()> {
        let transport = &self.inner.transport;
        transport.init_devices().await?;
        transport.enable_mic(self.inner.options.enable_mic()).await?;
        transport.enable_cam(self.inner.options.enable_cam()).await?;
        self.inner.devices_initialized.store(true, Ordering::SeqCst);
        self.inner.state.transition(
            |s| s == TransportState::Initializing,
            TransportState::Initialized,
        ).ok();
        Ok(())
    }

    /// Starts a session: initializes devices, authenticates against the
    /// backend and connects the transport.
    ///
    /// Fails unless the session is disconnected. A [`RtviClient::disconnect`]
    /// issued while starting stops the sequence at the next step. Every other
    /// failure tears the session down and is reported as
    /// [`RtviError::StartFailed`].
    pub async fn start(&self) -> Result<()> {
        let first_step = if self.inner.devices_initialized.load(Ordering::SeqCst) {
            TransportState::Authenticating
        } else {
            TransportState::Initializing
        };
        let startable = |s: TransportState| matches!(s, TransportState::Disconnected | TransportState::Initialized);
        if let Err(current) = self.inner.state.transition(startable, first_step) {
            return Err(RtviError::start_failed(RtviError::other(format!(
                "cannot start a session while {}",
                current
            ))));
        }
        self.inner.disconnect_requested.store(false, Ordering::SeqCst);

        match self.run_start().await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!("failed to start: {}", e.detailed_message());
                if let Err(e) = self.disconnect().await {
                    tracing::error!("failed to disconnect after start failure: {}", e);
                }
                self.inner.state.set(TransportState::Disconnected);
                Err(RtviError::start_failed(e))
            }
        }
    }

    async fn run_start(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.devices_initialized.load(Ordering::SeqCst) {
            self.initialize_devices().await?;
        }
        let authenticating = [TransportState::Initialized, TransportState::Authenticating];
        if !self.advance(&authenticating, TransportState::Authenticating).await? {
            return Ok(());
        }

        let auth_bundle = match inner.options.base_url() {
            Some(base_url) => Some(
                http::fetch_auth_bundle(&inner.http_client, base_url, &inner.options, &inner.request_data)
                    .await?,
            ),
            None => None,
        };
        if !self
            .advance(&[TransportState::Authenticating], TransportState::Connecting)
            .await?
        {
            return Ok(());
        }

        inner.transport.connect(auth_bundle).await?;
        if self.bail_if_disconnected().await {
            return Ok(());
        }

        inner
            .state
            .transition(|s| s == TransportState::Connecting, TransportState::Connected)
            .ok();
        if inner.transport.is_connected() {
            inner.transport.send_message(&RtviMessageOutbound::client_ready())?;
        } else {
            tracing::debug!("transport has no live connection, not sending client-ready");
        }
        Ok(())
    }

    /// Moves a starting session from one of `from` to `next`.
    ///
    /// Returns `false` when the start was abandoned because of a disconnect.
    async fn advance(&self, from: &[TransportState], next: TransportState) -> Result<bool> {
        if self.bail_if_disconnected().await {
            return Ok(false);
        }
        match self.inner.state.transition(|s| from.contains(&s), next) {
            Ok(_) => Ok(true),
            Err(_) if self.bail_if_disconnected().await => Ok(false),
            Err(current) => Err(RtviError::other(format!(
                "session moved to {} while starting",
                current
            ))),
        }
    }

    async fn bail_if_disconnected(&self) -> bool {
        if !self.inner.disconnect_requested.load(Ordering::SeqCst) {
            return false;
        }
        tracing::info!("disconnect requested, abandoning start");
        if !matches!(
            self.state(),
            TransportState::Disconnecting | TransportState::Disconnected
        ) {
            if let Err(e) = self.disconnect().await {
                tracing::error!("failed to disconnect: {}", e);
            }
        }
        true
    }

    /// Ends the session. A start in progress stops at its next step.
    pub async fn disconnect(&self) -> Result<()> {
        // raised first so a start observing `disconnecting` also sees the request
        self.inner.disconnect_requested.store(true, Ordering::SeqCst);
        self.inner.state.set(TransportState::Disconnecting);
        self.inner.transport.disconnect().await
    }

    /// Releases the transport. The client cannot be used afterwards.
    pub async fn release(&self) {
        self.inner.transport.release().await;
    }

    /// Session expiry in seconds since the Unix epoch, if known.
    pub fn expiry(&self) -> Option<u64> {
        self.inner.transport.expiry()
    }

    /// Sends a message over the transport without waiting for a response.
    pub fn send_message(&self, message: &RtviMessageOutbound) -> Result<()> {
        self.inner.transport.send_message(message)
    }

    // --- inbound routing

    fn on_message(&self, message: RtviMessageInbound) {
        let Some(message_type) = message.message_type() else {
            tracing::debug!("dropping message without type");
            return;
        };
        tracing::debug!(
            "received message: {}, id={}",
            message_type,
            message.id().unwrap_or("unknown")
        );

        let inner = &self.inner;
        let delegate = &inner.delegate;
        match InboundMessageType::parse(message_type) {
            InboundMessageType::BotReady => {
                let live = |s: TransportState| {
                    matches!(
                        s,
                        TransportState::Connecting | TransportState::Connected | TransportState::Ready
                    )
                };
                if inner.state.transition(live, TransportState::Ready).is_err() {
                    return;
                }
                if let Some(data) = decode::<BotReadyData>(&message) {
                    delegate.notify(|d| d.on_bot_ready(&data));
                }
            }
            InboundMessageType::UserTranscription => {
                if let Some(data) = decode::<Transcript>(&message) {
                    delegate.notify(|d| d.on_user_transcript(&data));
                }
            }
            InboundMessageType::BotTranscription => {
                if let Some(data) = decode::<Transcript>(&message) {
                    delegate.notify(|d| d.on_bot_transcript(data.text()));
                }
            }
            InboundMessageType::BotLlmText => {
                if let Some(data) = decode::<BotLlmText>(&message) {
                    delegate.notify(|d| d.on_bot_llm_text(&data));
                }
            }
            InboundMessageType::BotTtsText => {
                if let Some(data) = decode::<BotTtsText>(&message) {
                    delegate.notify(|d| d.on_bot_tts_text(&data));
                }
            }
            InboundMessageType::StorageItemStored => {
                if let Some(data) = decode::<StorageItemStoredData>(&message) {
                    delegate.notify(|d| d.on_storage_item_stored(&data));
                }
            }
            InboundMessageType::PipecatMetrics => {
                if let Some(metrics) = message.metrics() {
                    delegate.notify(|d| d.on_metrics(metrics));
                }
            }
            InboundMessageType::UserStartedSpeaking => {
                delegate.notify(|d| d.on_user_started_speaking());
            }
            InboundMessageType::UserStoppedSpeaking => {
                delegate.notify(|d| d.on_user_stopped_speaking());
            }
            InboundMessageType::ActionResponse
            | InboundMessageType::DescribeActionResponse
            | InboundMessageType::DescribeConfigResponse
            | InboundMessageType::ConfigResponse => {
                inner.dispatcher.resolve(&message);
            }
            InboundMessageType::ErrorResponse => {
                tracing::warn!("received error response: {:?}", message.data());
                inner.dispatcher.reject(&message);
                if let Some(data) = decode::<ErrorResponse>(&message) {
                    delegate.notify(|d| d.on_error(data.error()));
                }
            }
            InboundMessageType::Error => {
                tracing::warn!("received error: {:?}", message.data());
                inner.dispatcher.reject(&message);
                if let Some(data) = decode::<BotError>(&message) {
                    let error = format!("Received an error from the Bot: {}", data.error());
                    delegate.notify(|d| d.on_error(&error));
                    if data.is_fatal() {
                        self.spawn_disconnect();
                    }
                }
            }
            InboundMessageType::Custom(message_type) => {
                let handlers = self.helpers().handlers_for(&message_type);
                if handlers.is_empty() {
                    tracing::debug!("unexpected message type: {}", message_type);
                    delegate.notify(|d| d.on_generic_message(&message));
                }
                for helper in handlers {
                    helper.handle_message(&message);
                }
            }
        }
    }

    fn spawn_disconnect(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("no runtime available to disconnect after a fatal error");
            return;
        };
        let client = self.clone();
        runtime.spawn(async move {
            if let Err(e) = client.disconnect().await {
                tracing::error!("failed to disconnect after a fatal error: {}", e);
            }
        });
    }

    // --- requests

    fn assert_ready(&self) -> Result<()> {
        if self.state() != TransportState::Ready {
            return Err(RtviError::BotNotReady);
        }
        Ok(())
    }

    async fn request<T: DeserializeOwned>(&self, message: RtviMessageOutbound) -> Result<T> {
        self.assert_ready()?;
        let response = self.inner.dispatcher.dispatch_async(message).await?;
        Ok(response.decode_data()?)
    }

    /// Requests the bot's current configuration.
    pub async fn get_config(&self) -> Result<ConfigResponse> {
        let response: ConfigResponse = self.request(RtviMessageOutbound::get_config()).await?;
        self.inner
            .delegate
            .notify(|d| d.on_config_updated(response.config()));
        Ok(response)
    }

    /// Requests a description of every configurable option.
    pub async fn describe_config(&self) -> Result<DescribeConfigResponse> {
        let response: DescribeConfigResponse =
            self.request(RtviMessageOutbound::describe_config()).await?;
        self.inner
            .delegate
            .notify(|d| d.on_config_described(response.config()));
        Ok(response)
    }

    /// Updates the bot's configuration, interrupting the bot if `interrupt` is set.
    pub async fn update_config(
        &self,
        config: Vec<ServiceConfig>,
        interrupt: bool,
    ) -> Result<ConfigResponse> {
        self.assert_ready()?;
        let response = self
            .push_config(&config, interrupt)
            .await
            .map_err(|e| RtviError::ConfigUpdateFailed {
                source: Box::new(e),
            })?;
        self.inner
            .delegate
            .notify(|d| d.on_config_updated(response.config()));
        Ok(response)
    }

    async fn push_config(&self, config: &[ServiceConfig], interrupt: bool) -> Result<ConfigResponse> {
        let message = RtviMessageOutbound::update_config(config, interrupt)?;
        self.request(message).await
    }

    /// Requests a description of the actions the bot offers.
    pub async fn describe_actions(&self) -> Result<DescribeActionResponse> {
        let response: DescribeActionResponse =
            self.request(RtviMessageOutbound::describe_actions()).await?;
        self.inner
            .delegate
            .notify(|d| d.on_actions_available(response.actions()));
        Ok(response)
    }

    /// Runs an action on the bot and returns its raw response.
    pub async fn action(&self, action: ActionRequest) -> Result<ActionResponse> {
        self.request(RtviMessageOutbound::action(&action)?).await
    }

    /// Runs an action on the bot and decodes the `result` of its response as `T`.
    pub async fn action_with_result<T: DeserializeOwned>(&self, action: ActionRequest) -> Result<T> {
        let response: ActionResponseWrapper<T> =
            self.request(RtviMessageOutbound::action(&action)?).await?;
        Ok(response.result)
    }

    // --- devices

    pub fn get_all_mics(&self) -> Vec<MediaDeviceInfo> {
        self.inner.transport.get_all_mics()
    }

    pub fn get_all_cams(&self) -> Vec<MediaDeviceInfo> {
        self.inner.transport.get_all_cams()
    }

    pub fn selected_mic(&self) -> Option<MediaDeviceInfo> {
        self.inner.transport.selected_mic()
    }

    pub fn selected_cam(&self) -> Option<MediaDeviceInfo> {
        self.inner.transport.selected_cam()
    }

    pub async fn update_mic(&self, mic_id: MediaDeviceId) -> Result<()> {
        self.inner.transport.update_mic(mic_id).await
    }

    pub async fn update_cam(&self, cam_id: MediaDeviceId) -> Result<()> {
        self.inner.transport.update_cam(cam_id).await
    }

    pub async fn enable_mic(&self, enable: bool) -> Result<()> {
        self.inner.transport.enable_mic(enable).await
    }

    pub async fn enable_cam(&self, enable: bool) -> Result<()> {
        self.inner.transport.enable_cam(enable).await
    }

    pub fn is_mic_enabled(&self) -> bool {
        self.inner.transport.is_mic_enabled()
    }

    pub fn is_cam_enabled(&self) -> bool {
        self.inner.transport.is_cam_enabled()
    }

    pub fn tracks(&self) -> Option<Tracks> {
        self.inner.transport.tracks()
    }

    // --- helpers

    fn helpers(&self) -> MutexGuard<'_, HelperRegistry> {
        self.inner
            .helpers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a helper of type `T` bound to this client and registers it under `service`.
    pub fn register_helper<T: RtviClientHelper>(&self, service: &str) -> Result<Arc<T>> {
        // built before locking, `new` may call back into the client
        let helper = T::new(service, self.downgrade());
        self.helpers().register(service, move || helper)
    }

    pub fn unregister_helper(&self, service: &str) -> Result<()> {
        self.helpers().unregister(service)
    }

    pub fn get_helper<T: RtviClientHelper>(&self, service: &str) -> Result<Arc<T>> {
        self.helpers().get(service)
    }

    callback_variants! {
        fn start_with_callback => start() -> ();
        fn disconnect_with_callback => disconnect() -> ();
        fn init_devices_with_callback => init_devices() -> ();
        fn get_config_with_callback => get_config() -> ConfigResponse;
        fn describe_config_with_callback => describe_config() -> DescribeConfigResponse;
        fn update_config_with_callback => update_config(config: Vec<ServiceConfig>, interrupt: bool) -> ConfigResponse;
        fn describe_actions_with_callback => describe_actions() -> DescribeActionResponse;
        fn action_with_callback => action(action: ActionRequest) -> ActionResponse;
        fn update_mic_with_callback => update_mic(mic_id: MediaDeviceId) -> ();
        fn update_cam_with_callback => update_cam(cam_id: MediaDeviceId) -> ();
        fn enable_mic_with_callback => enable_mic(enable: bool) -> ();
        fn enable_cam_with_callback => enable_cam(enable: bool) -> ();
    }
}
