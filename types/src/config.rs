use crate::Value;

/// A single named option of a backend service.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfigOption {
    name: String,
    value: Value,
}

impl ConfigOption {
    pub fn new(name: &str, value: Value) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Configuration of one backend service, e.g. `llm` or `tts`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServiceConfig {
    service: String,
    options: Vec<ConfigOption>,
}

impl ServiceConfig {
    pub fn new(service: &str, options: Vec<ConfigOption>) -> Self {
        Self {
            service: service.to_string(),
            options,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    pub fn option(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|option| option.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OptionType {
    #[serde(rename = "string")]
    Str,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "object")]
    Object,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptionDescription {
    name: String,
    #[serde(rename = "type")]
    option_type: OptionType,
}

impl OptionDescription {
    pub fn new(name: &str, option_type: OptionType) -> Self {
        Self {
            name: name.to_string(),
            option_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn option_type(&self) -> OptionType {
        self.option_type
    }
}

/// Options a service accepts. Bots report the service under either `service` or `name`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServiceConfigDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    options: Vec<OptionDescription>,
}

impl ServiceConfigDescription {
    pub fn new(service: Option<&str>, name: Option<&str>, options: Vec<OptionDescription>) -> Self {
        Self {
            service: service.map(str::to_string),
            name: name.map(str::to_string),
            options,
        }
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref().or(self.name.as_deref())
    }

    pub fn options(&self) -> &[OptionDescription] {
        &self.options
    }
}
