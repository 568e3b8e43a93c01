use crate::{ActionDescription, ServiceConfig, ServiceConfigDescription, Value};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfigResponse {
    config: Vec<ServiceConfig>,
}

impl ConfigResponse {
    pub fn new(config: Vec<ServiceConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &[ServiceConfig] {
        &self.config
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DescribeConfigResponse {
    config: Vec<ServiceConfigDescription>,
}

impl DescribeConfigResponse {
    pub fn config(&self) -> &[ServiceConfigDescription] {
        &self.config
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DescribeActionResponse {
    actions: Vec<ActionDescription>,
}

impl DescribeActionResponse {
    pub fn actions(&self) -> &[ActionDescription] {
        &self.actions
    }
}

/// Body of an `error-response` message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    error: String,
}

impl ErrorResponse {
    pub fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
        }
    }

    pub fn error(&self) -> &str {
        &self.error
    }
}

/// Body of an `error` message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BotError {
    error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fatal: Option<bool>,
}

impl BotError {
    pub fn new(error: &str, fatal: bool) -> Self {
        Self {
            error: error.to_string(),
            fatal: Some(fatal),
        }
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BotReadyData {
    version: String,
    #[serde(default)]
    config: Vec<ServiceConfig>,
}

impl BotReadyData {
    pub fn new(version: &str, config: Vec<ServiceConfig>) -> Self {
        Self {
            version: version.to_string(),
            config,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &[ServiceConfig] {
        &self.config
    }
}

/// A written transcript of some spoken words.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transcript {
    text: String,
    #[serde(default, rename = "final", skip_serializing_if = "Option::is_none")]
    final_: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

impl Transcript {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_final(&self) -> Option<bool> {
        self.final_
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BotLlmText {
    text: String,
}

impl BotLlmText {
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BotTtsText {
    text: String,
}

impl BotTtsText {
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Notification that the bot persisted some items.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StorageItemStoredData {
    action: String,
    items: Value,
}

impl StorageItemStoredData {
    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn items(&self) -> &Value {
        &self.items
    }
}
