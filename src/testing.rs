use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rtvi_client_types::media::{MediaDeviceId, MediaDeviceInfo, Participant, Tracks};
use rtvi_client_types::{
    BotReadyData, PipecatMetrics, RtviMessageInbound, RtviMessageOutbound, ServiceConfig, Transcript,
    TransportState,
};
use tokio::sync::Notify;

use crate::delegate::RtviClientDelegate;
use crate::error::{Result, RtviError};
use crate::transport::{AuthBundle, Transport, TransportContext};

type Responder = Box<dyn Fn(&RtviMessageOutbound) -> Option<RtviMessageInbound> + Send + Sync>;

/// In-memory transport that records what is sent and replies through a responder.
#[derive(Default)]
pub struct FakeTransport {
    context: Mutex<Option<TransportContext>>,
    sent: Mutex<Vec<RtviMessageOutbound>>,
    responder: Mutex<Option<Arc<Responder>>>,
    connect_gate: Mutex<Option<Arc<Notify>>>,
    auth_bundles: Mutex<Vec<Option<AuthBundle>>>,
    connected: AtomicBool,
    http_only: bool,
    pub init_calls: AtomicUsize,
    pub connect_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose session runs without a live connection, so every
    /// request goes over HTTP.
    pub fn http_only() -> Self {
        Self {
            http_only: true,
            ..Self::default()
        }
    }

    fn context(&self) -> Option<TransportContext> {
        self.context.lock().unwrap().clone()
    }

    /// Simulates a message arriving from the bot.
    pub fn deliver(&self, message: RtviMessageInbound) {
        let context = self.context().expect("transport not attached");
        (context.on_message)(message);
    }

    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&RtviMessageOutbound) -> Option<RtviMessageInbound> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap() = Some(Arc::new(Box::new(responder)));
    }

    /// Makes `connect` wait until the returned notify is triggered.
    pub fn gate_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.connect_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn sent(&self) -> Vec<RtviMessageOutbound> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_of_type(&self, message_type: &str) -> Vec<RtviMessageOutbound> {
        self.sent()
            .into_iter()
            .filter(|m| m.message_type() == message_type)
            .collect()
    }

    pub fn auth_bundles(&self) -> Vec<Option<AuthBundle>> {
        self.auth_bundles.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn attach(&self, context: TransportContext) {
        *self.context.lock().unwrap() = Some(context);
    }

    async fn init_devices(&self) -> Result<()> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) {}

    async fn connect(&self, auth_bundle: Option<AuthBundle>) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.auth_bundles.lock().unwrap().push(auth_bundle);
        let gate = self.connect_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let Some(context) = self.context() else {
            return Ok(());
        };
        if context
            .state
            .transition(|s| s == TransportState::Connecting, TransportState::Connected)
            .is_ok()
        {
            self.connected.store(!self.http_only, Ordering::SeqCst);
            context.delegate.notify(|d| d.on_connected());
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        if let Some(context) = self.context() {
            context.state.set(TransportState::Disconnected);
            context.delegate.notify(|d| d.on_disconnected());
        }
        Ok(())
    }

    fn get_all_mics(&self) -> Vec<MediaDeviceInfo> {
        Vec::new()
    }

    fn get_all_cams(&self) -> Vec<MediaDeviceInfo> {
        Vec::new()
    }

    async fn update_mic(&self, _mic_id: MediaDeviceId) -> Result<()> {
        Ok(())
    }

    async fn update_cam(&self, _cam_id: MediaDeviceId) -> Result<()> {
        Ok(())
    }

    fn selected_mic(&self) -> Option<MediaDeviceInfo> {
        None
    }

    fn selected_cam(&self) -> Option<MediaDeviceInfo> {
        None
    }

    async fn enable_mic(&self, _enable: bool) -> Result<()> {
        Ok(())
    }

    async fn enable_cam(&self, _enable: bool) -> Result<()> {
        Ok(())
    }

    fn is_mic_enabled(&self) -> bool {
        false
    }

    fn is_cam_enabled(&self) -> bool {
        false
    }

    fn send_message(&self, message: &RtviMessageOutbound) -> Result<()> {
        if !self.is_connected() {
            return Err(RtviError::transport("not connected"));
        }
        self.sent.lock().unwrap().push(message.clone());

        let responder = self.responder.lock().unwrap().clone();
        let reply = responder.and_then(|responder| responder(message));
        if let (Some(reply), Some(context)) = (reply, self.context()) {
            tokio::spawn(async move { (context.on_message)(reply) });
        }
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.context()
            .map(|c| c.state.get())
            .unwrap_or(TransportState::Disconnected)
    }

    fn set_state(&self, state: TransportState) {
        if let Some(context) = self.context() {
            context.state.set(state);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn tracks(&self) -> Option<Tracks> {
        None
    }

    fn expiry(&self) -> Option<u64> {
        None
    }
}

/// Delegate that records every event it receives as a short string.
#[derive(Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<String>>,
    states: Mutex<Vec<TransportState>>,
}

impl RecordingDelegate {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn states(&self) -> Vec<TransportState> {
        self.states.lock().unwrap().clone()
    }
}

impl RtviClientDelegate for RecordingDelegate {
    fn on_connected(&self) {
        self.record("connected".to_string());
    }

    fn on_disconnected(&self) {
        self.record("disconnected".to_string());
    }

    fn on_transport_state_changed(&self, state: TransportState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_config_updated(&self, config: &[ServiceConfig]) {
        self.record(format!("config-updated:{}", config.len()));
    }

    fn on_bot_ready(&self, data: &BotReadyData) {
        self.record(format!("bot-ready:{}", data.version()));
    }

    fn on_bot_connected(&self, participant: &Participant) {
        self.record(format!("bot-connected:{}", participant.id().id()));
    }

    fn on_user_started_speaking(&self) {
        self.record("user-started-speaking".to_string());
    }

    fn on_user_stopped_speaking(&self) {
        self.record("user-stopped-speaking".to_string());
    }

    fn on_metrics(&self, data: &PipecatMetrics) {
        self.record(format!("metrics:{}", data.ttfb().len()));
    }

    fn on_user_transcript(&self, data: &Transcript) {
        self.record(format!("user-transcript:{}", data.text()));
    }

    fn on_bot_transcript(&self, text: &str) {
        self.record(format!("bot-transcript:{}", text));
    }

    fn on_error(&self, message: &str) {
        self.record(format!("error:{}", message));
    }

    fn on_generic_message(&self, message: &RtviMessageInbound) {
        self.record(format!("generic:{}", message.message_type().unwrap_or_default()));
    }
}

/// Yields to the runtime until `condition` holds, failing after one second.
pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
