use serde::de::DeserializeOwned;

use crate::PipecatMetrics;
use crate::messages::{MESSAGE_LABEL, generate_message_id};

/// Message types sent from the bot to the client.
///
/// Response types are recognised under both their historical wire names and
/// their descriptive names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessageType {
    /// Bot is connected and ready to receive messages
    BotReady,
    ErrorResponse,
    Error,
    UserTranscription,
    BotTranscription,
    BotLlmText,
    BotTtsText,
    StorageItemStored,
    PipecatMetrics,
    UserStartedSpeaking,
    UserStoppedSpeaking,
    ActionResponse,
    DescribeActionResponse,
    DescribeConfigResponse,
    ConfigResponse,
    /// Anything else, including helper-defined types.
    Custom(String),
}

impl InboundMessageType {
    pub const BOT_READY: &'static str = "bot-ready";
    pub const ERROR_RESPONSE: &'static str = "error-response";
    pub const ERROR: &'static str = "error";
    pub const USER_TRANSCRIPTION: &'static str = "user-transcription";
    pub const BOT_TRANSCRIPTION: &'static str = "bot-transcription";
    pub const BOT_LLM_TEXT: &'static str = "bot-llm-text";
    pub const BOT_TTS_TEXT: &'static str = "bot-tts-text";
    pub const STORAGE_ITEM_STORED: &'static str = "storage-item-stored";
    pub const PIPECAT_METRICS: &'static str = "pipecat-metrics";
    pub const USER_STARTED_SPEAKING: &'static str = "user-started-speaking";
    pub const USER_STOPPED_SPEAKING: &'static str = "user-stopped-speaking";
    pub const ACTION_RESPONSE: &'static str = "action-response";
    pub const DESCRIBE_ACTION_RESPONSE: &'static str = "actions-available";
    pub const DESCRIBE_CONFIG_RESPONSE: &'static str = "config-available";
    pub const CONFIG_RESPONSE: &'static str = "config";

    pub fn parse(message_type: &str) -> Self {
        match message_type {
            Self::BOT_READY => Self::BotReady,
            Self::ERROR_RESPONSE => Self::ErrorResponse,
            Self::ERROR => Self::Error,
            Self::USER_TRANSCRIPTION => Self::UserTranscription,
            Self::BOT_TRANSCRIPTION => Self::BotTranscription,
            Self::BOT_LLM_TEXT => Self::BotLlmText,
            Self::BOT_TTS_TEXT => Self::BotTtsText,
            Self::STORAGE_ITEM_STORED => Self::StorageItemStored,
            Self::PIPECAT_METRICS => Self::PipecatMetrics,
            Self::USER_STARTED_SPEAKING => Self::UserStartedSpeaking,
            Self::USER_STOPPED_SPEAKING => Self::UserStoppedSpeaking,
            Self::ACTION_RESPONSE => Self::ActionResponse,
            Self::DESCRIBE_ACTION_RESPONSE | "describe-action-response" => {
                Self::DescribeActionResponse
            }
            Self::DESCRIBE_CONFIG_RESPONSE | "describe-config-response" => {
                Self::DescribeConfigResponse
            }
            Self::CONFIG_RESPONSE | "config-response" => Self::ConfigResponse,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// An RTVI control message received by the transport.
///
/// `data` keeps the JSON text of the payload so that each consumer decodes it
/// into the type it expects.
#[derive(Debug, Clone, PartialEq)]
pub struct RtviMessageInbound {
    id: Option<String>,
    label: Option<String>,
    message_type: Option<String>,
    data: Option<String>,
    metrics: Option<PipecatMetrics>,
}

impl RtviMessageInbound {
    /// Builds a message with a fresh id, as done for locally synthesized messages.
    pub fn new(message_type: &str, data: Option<String>) -> Self {
        Self::with_id(Some(&generate_message_id()), message_type, data)
    }

    pub fn with_id(id: Option<&str>, message_type: &str, data: Option<String>) -> Self {
        Self {
            id: id.map(str::to_string),
            label: Some(MESSAGE_LABEL.to_string()),
            message_type: Some(message_type.to_string()),
            data,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: PipecatMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn message_type(&self) -> Option<&str> {
        self.message_type.as_deref()
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn metrics(&self) -> Option<&PipecatMetrics> {
        self.metrics.as_ref()
    }

    /// Decodes the payload into `T`. A message without payload decodes as JSON `null`.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.data.as_deref().unwrap_or("null"))
    }
}

#[derive(serde::Deserialize)]
struct RawInbound {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    label: Option<serde_json::Value>,
    #[serde(default, rename = "type")]
    message_type: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    metrics: Option<serde_json::Value>,
}

fn as_string(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    }
}

impl<'de> serde::Deserialize<'de> for RtviMessageInbound {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawInbound::deserialize(deserializer)?;
        let data = match raw.data {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(serde_json::to_string(&value).map_err(serde::de::Error::custom)?),
        };
        Ok(Self {
            id: as_string(raw.id),
            label: as_string(raw.label),
            message_type: raw.message_type,
            data,
            // malformed metrics are dropped rather than failing the whole message
            metrics: raw.metrics.and_then(|m| serde_json::from_value(m).ok()),
        })
    }
}
