use std::sync::{Arc, PoisonError, RwLock, Weak};

use rtvi_client_types::media::{MediaDeviceInfo, Participant};
use rtvi_client_types::{
    ActionDescription, BotLlmText, BotReadyData, BotTtsText, PipecatMetrics, RtviMessageInbound,
    ServiceConfig, ServiceConfigDescription, StorageItemStoredData, Transcript, TransportState,
};

/// Callbacks invoked when changes occur in the RTVI session.
///
/// Every method has an empty default, implement the ones you care about.
#[allow(unused_variables)]
pub trait RtviClientDelegate: Send + Sync {
    /// Invoked when the underlying transport has connected.
    fn on_connected(&self) {}

    /// Invoked when the underlying transport has disconnected.
    fn on_disconnected(&self) {}

    fn on_transport_state_changed(&self, state: TransportState) {}

    /// Invoked when the session configuration has returned or changed.
    fn on_config_updated(&self, config: &[ServiceConfig]) {}

    fn on_config_described(&self, config: &[ServiceConfigDescription]) {}

    fn on_actions_available(&self, actions: &[ActionDescription]) {}

    fn on_bot_connected(&self, participant: &Participant) {}

    /// Invoked when the bot has indicated it is ready for commands.
    fn on_bot_ready(&self, data: &BotReadyData) {}

    fn on_bot_disconnected(&self, participant: &Participant) {}

    fn on_participant_joined(&self, participant: &Participant) {}

    fn on_participant_left(&self, participant: &Participant) {}

    fn on_available_cams_updated(&self, cams: &[MediaDeviceInfo]) {}

    fn on_available_mics_updated(&self, mics: &[MediaDeviceInfo]) {}

    fn on_cam_updated(&self, cam: Option<&MediaDeviceInfo>) {}

    fn on_mic_updated(&self, mic: Option<&MediaDeviceInfo>) {}

    /// Invoked regularly with the volume of the locally captured audio.
    fn on_user_audio_level(&self, level: f32) {}

    fn on_remote_audio_level(&self, level: f32, participant: &Participant) {}

    fn on_bot_started_speaking(&self, participant: &Participant) {}

    fn on_bot_stopped_speaking(&self, participant: &Participant) {}

    fn on_user_started_speaking(&self) {}

    fn on_user_stopped_speaking(&self) {}

    fn on_metrics(&self, data: &PipecatMetrics) {}

    fn on_user_transcript(&self, data: &Transcript) {}

    fn on_bot_transcript(&self, text: &str) {}

    fn on_bot_llm_text(&self, data: &BotLlmText) {}

    fn on_bot_tts_text(&self, data: &BotTtsText) {}

    fn on_storage_item_stored(&self, data: &StorageItemStoredData) {}

    /// Invoked when the bot reports an error.
    fn on_error(&self, message: &str) {}

    /// Invoked for messages that neither the client nor a registered helper handled.
    fn on_generic_message(&self, message: &RtviMessageInbound) {}
}

/// Non-owning, shareable slot holding the current delegate.
///
/// The client and its transport share one handle, so replacing the delegate is
/// seen by both. A delegate that has been dropped simply stops receiving events.
#[derive(Clone, Default)]
pub struct DelegateHandle {
    slot: Arc<RwLock<Option<Weak<dyn RtviClientDelegate>>>>,
}

impl DelegateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, delegate: Option<&Arc<dyn RtviClientDelegate>>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = delegate.map(Arc::downgrade);
    }

    pub fn get(&self) -> Option<Arc<dyn RtviClientDelegate>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Runs `f` against the delegate if one is still alive.
    pub fn notify<F>(&self, f: F)
    where
        F: FnOnce(&dyn RtviClientDelegate),
    {
        if let Some(delegate) = self.get() {
            f(delegate.as_ref());
        }
    }
}

impl std::fmt::Debug for DelegateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateHandle")
            .field("attached", &self.get().is_some())
            .finish()
    }
}
