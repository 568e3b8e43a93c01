use crate::{ConfigOption, OptionDescription, OptionType, Value};

pub type Argument = ConfigOption;

/// Invocation of a named action on a backend service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ActionRequest {
    service: String,
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    arguments: Option<Vec<Argument>>,
}

impl ActionRequest {
    pub fn new(service: &str, action: &str) -> Self {
        Self {
            service: service.to_string(),
            action: action.to_string(),
            arguments: None,
        }
    }

    pub fn with_argument(mut self, name: &str, value: Value) -> Self {
        self.arguments
            .get_or_insert_with(Vec::new)
            .push(Argument::new(name, value));
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn arguments(&self) -> &[Argument] {
        self.arguments.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ActionDescription {
    service: String,
    action: String,
    arguments: Vec<OptionDescription>,
    result: OptionType,
}

impl ActionDescription {
    pub fn new(
        service: &str,
        action: &str,
        arguments: Vec<OptionDescription>,
        result: OptionType,
    ) -> Self {
        Self {
            service: service.to_string(),
            action: action.to_string(),
            arguments,
            result,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn arguments(&self) -> &[OptionDescription] {
        &self.arguments
    }

    pub fn result(&self) -> OptionType {
        self.result
    }
}

/// Untyped result of an action.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ActionResponse {
    result: Value,
}

impl ActionResponse {
    pub fn new(result: Value) -> Self {
        Self { result }
    }

    pub fn result(&self) -> &Value {
        &self.result
    }
}

/// `{ "result": T }` envelope used to decode a typed action result.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ActionResponseWrapper<T> {
    pub result: T,
}
