use crate::messages::{MESSAGE_LABEL, generate_message_id};
use crate::{ActionRequest, ServiceConfig, Value, ValueError};

/// Message types sent from the client to the bot.
pub struct OutboundMessageType;

impl OutboundMessageType {
    pub const UPDATE_CONFIG: &'static str = "update-config";
    pub const GET_CONFIG: &'static str = "get-config";
    pub const DESCRIBE_CONFIG: &'static str = "describe-config";
    pub const ACTION: &'static str = "action";
    pub const DESCRIBE_ACTIONS: &'static str = "describe-actions";
    pub const CLIENT_READY: &'static str = "client-ready";
}

/// An RTVI control message sent to the bot.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RtviMessageOutbound {
    id: String,
    label: String,
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl RtviMessageOutbound {
    pub fn new(message_type: &str, data: Option<Value>) -> Self {
        Self::with_id(&generate_message_id(), message_type, data)
    }

    pub fn with_id(id: &str, message_type: &str, data: Option<Value>) -> Self {
        Self {
            id: id.to_string(),
            label: MESSAGE_LABEL.to_string(),
            message_type: message_type.to_string(),
            data,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn action(action: &ActionRequest) -> Result<Self, ValueError> {
        Ok(Self::new(
            OutboundMessageType::ACTION,
            Some(Value::from_serializable(action)?),
        ))
    }

    pub fn update_config(config: &[ServiceConfig], interrupt: bool) -> Result<Self, ValueError> {
        let data: Value = [
            ("config", Value::from_serializable(config)?),
            ("interrupt", Value::Boolean(interrupt)),
        ]
        .into_iter()
        .collect();
        Ok(Self::new(OutboundMessageType::UPDATE_CONFIG, Some(data)))
    }

    pub fn describe_config() -> Self {
        Self::new(OutboundMessageType::DESCRIBE_CONFIG, None)
    }

    pub fn get_config() -> Self {
        Self::new(OutboundMessageType::GET_CONFIG, None)
    }

    pub fn describe_actions() -> Self {
        Self::new(OutboundMessageType::DESCRIBE_ACTIONS, None)
    }

    pub fn client_ready() -> Self {
        Self::new(OutboundMessageType::CLIENT_READY, None)
    }
}
