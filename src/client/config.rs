use std::collections::BTreeMap;
use std::time::Duration;

use rtvi_client_types::{ServiceConfig, Value};
use secrecy::SecretString;

use crate::client::consts;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Paths appended to the base url for each backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    connect: String,
    action: String,
}

impl Endpoints {
    pub fn new(connect: &str, action: &str) -> Self {
        Self {
            connect: connect.to_string(),
            action: action.to_string(),
        }
    }

    pub fn connect(&self) -> &str {
        &self.connect
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(
            consts::DEFAULT_CONNECT_ENDPOINT,
            consts::DEFAULT_ACTION_ENDPOINT,
        )
    }
}

/// Everything the client needs to reach the backend and set up a session.
#[derive(Debug, Clone)]
pub struct RtviClientOptions {
    base_url: Option<String>,
    endpoints: Endpoints,
    headers: Vec<(String, SecretString)>,
    request_data: Option<Value>,
    config: Vec<ServiceConfig>,
    services: BTreeMap<String, String>,
    enable_mic: bool,
    enable_cam: bool,
    response_timeout: Duration,
    gc_interval: Duration,
}

pub struct RtviClientOptionsBuilder {
    options: RtviClientOptions,
}

impl RtviClientOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: RtviClientOptions::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.options.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.options.endpoints = endpoints;
        self
    }

    /// Adds a header sent with every request to the backend.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.options
            .headers
            .push((name.to_string(), SecretString::from(value.to_string())));
        self
    }

    pub fn with_api_key(self, api_key: &str) -> Self {
        self.with_header(consts::AUTHORIZATION_HEADER, &format!("Bearer {}", api_key))
    }

    /// Custom body merged into the connect and action requests.
    pub fn with_request_data(mut self, request_data: Value) -> Self {
        self.options.request_data = Some(request_data);
        self
    }

    pub fn with_config(mut self, config: Vec<ServiceConfig>) -> Self {
        self.options.config = config;
        self
    }

    pub fn with_service(mut self, service: &str, provider: &str) -> Self {
        self.options
            .services
            .insert(service.to_string(), provider.to_string());
        self
    }

    pub fn with_enable_mic(mut self, enable: bool) -> Self {
        self.options.enable_mic = enable;
        self
    }

    pub fn with_enable_cam(mut self, enable: bool) -> Self {
        self.options.enable_cam = enable;
        self
    }

    /// How long a request may wait for its response before it fails.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.options.response_timeout = timeout;
        self
    }

    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.options.gc_interval = interval;
        self
    }

    pub fn build(self) -> RtviClientOptions {
        self.options
    }
}

impl Default for RtviClientOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for RtviClientOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            endpoints: Endpoints::default(),
            headers: Vec::new(),
            request_data: None,
            config: Vec::new(),
            services: BTreeMap::new(),
            enable_mic: true,
            enable_cam: false,
            response_timeout: consts::DEFAULT_RESPONSE_TIMEOUT,
            gc_interval: consts::DEFAULT_GC_INTERVAL,
        }
    }
}

impl RtviClientOptions {
    pub fn builder() -> RtviClientOptionsBuilder {
        RtviClientOptionsBuilder::new()
    }

    /// Loads options from the environment, reading a `.env` file first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        if let Some(base_url) = lookup(consts::RTVI_BASE_URL) {
            builder = builder.with_base_url(&base_url);
        }

        let connect = lookup(consts::RTVI_CONNECT_ENDPOINT)
            .unwrap_or_else(|| consts::DEFAULT_CONNECT_ENDPOINT.to_string());
        let action = lookup(consts::RTVI_ACTION_ENDPOINT)
            .unwrap_or_else(|| consts::DEFAULT_ACTION_ENDPOINT.to_string());
        builder = builder.with_endpoints(Endpoints::new(&connect, &action));

        if let Some(api_key) = lookup(consts::RTVI_API_KEY).filter(|key| !key.is_empty()) {
            builder = builder.with_api_key(&api_key);
        }
        if let Some(value) = lookup(consts::RTVI_ENABLE_MIC) {
            builder = builder.with_enable_mic(parse_bool(consts::RTVI_ENABLE_MIC, &value)?);
        }
        if let Some(value) = lookup(consts::RTVI_ENABLE_CAM) {
            builder = builder.with_enable_cam(parse_bool(consts::RTVI_ENABLE_CAM, &value)?);
        }
        if let Some(value) = lookup(consts::RTVI_RESPONSE_TIMEOUT_SECS) {
            let secs = value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: consts::RTVI_RESPONSE_TIMEOUT_SECS,
                    expected: "a positive number of seconds",
                    value: value.clone(),
                })?;
            builder = builder.with_response_timeout(Duration::from_secs(secs));
        }
        Ok(builder.build())
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn headers(&self) -> &[(String, SecretString)] {
        &self.headers
    }

    pub fn request_data(&self) -> Option<&Value> {
        self.request_data.as_ref()
    }

    pub fn config(&self) -> &[ServiceConfig] {
        &self.config
    }

    pub fn services(&self) -> &BTreeMap<String, String> {
        &self.services
    }

    pub fn enable_mic(&self) -> bool {
        self.enable_mic
    }

    pub fn enable_cam(&self) -> bool {
        self.enable_cam
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub fn gc_interval(&self) -> Duration {
        self.gc_interval
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = RtviClientOptions::builder().build();
        assert_eq!(options.base_url(), None);
        assert_eq!(options.endpoints().connect(), "/connect");
        assert_eq!(options.endpoints().action(), "/action");
        assert!(options.enable_mic());
        assert!(!options.enable_cam());
        assert_eq!(options.response_timeout(), Duration::from_secs(10));
        assert_eq!(options.gc_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_from_lookup() {
        let options = RtviClientOptions::from_lookup(lookup(&[
            ("RTVI_BASE_URL", "https://bot.example.com/api/"),
            ("RTVI_ACTION_ENDPOINT", "/bot/action"),
            ("RTVI_API_KEY", "secret"),
            ("RTVI_ENABLE_CAM", "true"),
            ("RTVI_RESPONSE_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(options.base_url(), Some("https://bot.example.com/api"));
        assert_eq!(options.endpoints().connect(), "/connect");
        assert_eq!(options.endpoints().action(), "/bot/action");
        assert!(options.enable_cam());
        assert_eq!(options.response_timeout(), Duration::from_secs(30));

        let (name, value) = &options.headers()[0];
        assert_eq!(name, "Authorization");
        assert_eq!(value.expose_secret(), "Bearer secret");
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let error = RtviClientOptions::from_lookup(lookup(&[("RTVI_ENABLE_MIC", "maybe")]))
            .unwrap_err();
        assert!(error.to_string().contains("RTVI_ENABLE_MIC"));

        assert!(
            RtviClientOptions::from_lookup(lookup(&[("RTVI_RESPONSE_TIMEOUT_SECS", "0")])).is_err()
        );
    }
}
