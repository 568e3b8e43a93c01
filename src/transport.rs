use std::sync::Arc;

use async_trait::async_trait;
use rtvi_client_types::media::{MediaDeviceId, MediaDeviceInfo, Tracks};
use rtvi_client_types::{RtviMessageInbound, RtviMessageOutbound, TransportState};

use crate::delegate::DelegateHandle;
use crate::error::Result;
use crate::state::StateCell;

pub mod websocket;

/// Callback invoked with every message received from the bot.
pub type MessageHandler = Arc<dyn Fn(RtviMessageInbound) + Send + Sync>;

/// Initialization data returned by the backend's connect endpoint.
///
/// The content is opaque to the client and passed verbatim to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthBundle {
    data: String,
}

impl AuthBundle {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

/// Everything a transport receives from the client that owns it.
#[derive(Clone)]
pub struct TransportContext {
    /// Inbound messages must be handed here in the order they were received.
    pub on_message: MessageHandler,
    /// The session state. Transports report `connected`, `ready` and teardown through it.
    pub state: StateCell,
    pub delegate: DelegateHandle,
}

/// The connection between the client and the bot.
///
/// Implementations own the network session and any local media. They are
/// attached to exactly one client, which calls [`Transport::attach`] before
/// anything else.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    fn attach(&self, context: TransportContext);

    async fn init_devices(&self) -> Result<()>;

    /// Releases every resource held by the transport. The instance may not be reused.
    async fn release(&self);

    async fn connect(&self, auth_bundle: Option<AuthBundle>) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    fn get_all_mics(&self) -> Vec<MediaDeviceInfo>;

    fn get_all_cams(&self) -> Vec<MediaDeviceInfo>;

    async fn update_mic(&self, mic_id: MediaDeviceId) -> Result<()>;

    async fn update_cam(&self, cam_id: MediaDeviceId) -> Result<()>;

    fn selected_mic(&self) -> Option<MediaDeviceInfo>;

    fn selected_cam(&self) -> Option<MediaDeviceInfo>;

    async fn enable_mic(&self, enable: bool) -> Result<()>;

    async fn enable_cam(&self, enable: bool) -> Result<()>;

    fn is_mic_enabled(&self) -> bool;

    fn is_cam_enabled(&self) -> bool;

    /// Queues a message for delivery. Fails immediately if it cannot be sent.
    fn send_message(&self, message: &RtviMessageOutbound) -> Result<()>;

    fn state(&self) -> TransportState;

    fn set_state(&self, state: TransportState);

    fn is_connected(&self) -> bool;

    fn tracks(&self) -> Option<Tracks>;

    /// Session expiry as seconds since the Unix epoch, if the backend provided one.
    fn expiry(&self) -> Option<u64>;
}
